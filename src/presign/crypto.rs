//! HMAC-SHA256 signing for presigned upload tokens, plus the constant-time
//! comparison used for API keys.
//!
//! Signatures are hex encoded so that they can never contain the `|`
//! separator of the token payload.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// HMAC type alias for SHA-256
type HmacSha256 = Hmac<Sha256>;

fn mac_for(message: &str, secret: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    mac
}

/// Hex-encoded HMAC-SHA256 of `message` under `secret`.
pub fn sign(message: &str, secret: &[u8]) -> String {
    hex::encode(mac_for(message, secret).finalize().into_bytes())
}

/// Check a hex-encoded signature in constant time.
///
/// A signature that is not valid hex is simply a wrong signature.
pub fn verify(message: &str, signature_hex: &str, secret: &[u8]) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    mac_for(message, secret).verify_slice(&signature).is_ok()
}

/// Constant-time equality for secrets of possibly different lengths.
///
/// Only the length leaks; contents never short-circuit.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
