//! Presigned uploads
//!
//! A two-step, stateless handshake that lets an authenticated client hand a
//! browser (or any third party) permission to write exactly one file:
//!
//! ```text
//!   GET /presignurl?client=acme&filename=cat.png      (API key)
//!        │
//!        ▼  token = b64url( path | expires_at | hex(HMAC-SHA256(path|expires_at)) )
//!   { "url": "/presignedupload?client=acme&q=<token>" }
//!        │
//!        ▼
//!   PUT /presignedupload?client=acme&q=<token>         (origin only)
//!        decode → parse expiry → expiry check → signature check → write
//! ```
//!
//! Nothing is stored between the two steps; the token is the whole capability.
//! It can be replayed by whoever holds it until it expires.

pub mod crypto;

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::PresignConfig;
use crate::storage::{BlobKey, BlobStore};
use crate::types::{AppError, AppResult, TokenError};

/// Route that consumes presigned tokens.
pub const PRESIGNED_UPLOAD_PATH: &str = "/presignedupload";

/// URL-safe alphabet; padding is never emitted but tolerated on input.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decoded form of a presign token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignToken {
    pub path: String,
    pub expires_at: i64,
    pub signature: String,
}

impl PresignToken {
    fn signing_input(path: &str, expires_at: i64) -> String {
        format!("{}|{}", path, expires_at)
    }

    pub fn encode(&self) -> String {
        TOKEN_ENGINE.encode(format!(
            "{}|{}|{}",
            self.path, self.expires_at, self.signature
        ))
    }

    /// Parse an opaque token. Fields are split from the right, so the path
    /// may contain `|` itself.
    pub fn decode(raw: &str) -> Result<Self, TokenError> {
        let bytes = TOKEN_ENGINE
            .decode(raw.trim())
            .map_err(|e| TokenError::Malformed(format!("could not decode token: {}", e)))?;
        let payload = String::from_utf8(bytes)
            .map_err(|_| TokenError::Malformed("token is not valid UTF-8".to_string()))?;

        let fields: Vec<&str> = payload.rsplitn(3, '|').collect();
        let [signature, expires_at, path] = fields.as_slice() else {
            return Err(TokenError::Malformed(
                "expected path|expiry|signature".to_string(),
            ));
        };
        if path.is_empty() {
            return Err(TokenError::Malformed("token has an empty path".to_string()));
        }

        let expires_at = expires_at
            .parse::<i64>()
            .map_err(|_| TokenError::Malformed(format!("bad expiry {:?}", expires_at)))?;

        Ok(Self {
            path: path.to_string(),
            expires_at,
            signature: signature.to_string(),
        })
    }
}

/// Mints presign tokens. Only constructible from a validated [`PresignConfig`],
/// so an empty secret never reaches the signer.
#[derive(Clone)]
pub struct PresignIssuer {
    secret: Arc<[u8]>,
    ttl: Duration,
}

impl PresignIssuer {
    pub fn from_config(config: &PresignConfig) -> Self {
        Self {
            secret: Arc::from(config.secret.as_bytes()),
            ttl: Duration::seconds(config.ttl_secs),
        }
    }

    pub fn issue(&self, path: &Path, now: DateTime<Utc>) -> AppResult<PresignToken> {
        let path = path.display().to_string();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AppError::Internal("presign expiry out of range".to_string()))?
            .timestamp();
        let signature = crypto::sign(
            &PresignToken::signing_input(&path, expires_at),
            &self.secret,
        );
        Ok(PresignToken {
            path,
            expires_at,
            signature,
        })
    }

    /// Relative URL authorizing one upload of `key`.
    pub fn upload_url(
        &self,
        blobs: &dyn BlobStore,
        key: &BlobKey,
        now: DateTime<Utc>,
    ) -> AppResult<String> {
        let token = self.issue(&blobs.path_for(key), now)?;
        info!(
            client = key.client(),
            filename = key.filename(),
            expires_at = token.expires_at,
            "Presigned upload URL issued"
        );
        Ok(format!(
            "{}?client={}&q={}",
            PRESIGNED_UPLOAD_PATH,
            key.client(),
            token.encode()
        ))
    }
}

/// Checks presign tokens and admits the write they authorize.
#[derive(Clone)]
pub struct PresignVerifier {
    secret: Arc<[u8]>,
}

impl PresignVerifier {
    pub fn from_config(config: &PresignConfig) -> Self {
        Self {
            secret: Arc::from(config.secret.as_bytes()),
        }
    }

    /// Decode and validate `raw` as of `now`.
    ///
    /// A token is expired from its `expires_at` second onwards.
    pub fn verify(&self, raw: &str, now: DateTime<Utc>) -> Result<PresignToken, TokenError> {
        let token = PresignToken::decode(raw)?;

        if now.timestamp() >= token.expires_at {
            return Err(TokenError::Expired);
        }

        let signing_input = PresignToken::signing_input(&token.path, token.expires_at);
        if !crypto::verify(&signing_input, &token.signature, &self.secret) {
            return Err(TokenError::InvalidSignature);
        }

        Ok(token)
    }

    /// Validate `raw` and write `body` to the blob it names.
    ///
    /// `client` is the tenant the request was admitted under; a token minted
    /// for any other tenant is refused even when its signature is good.
    pub async fn redeem(
        &self,
        blobs: &dyn BlobStore,
        raw: &str,
        client: &str,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> AppResult<PathBuf> {
        let token = match self.verify(raw, now) {
            Ok(token) => token,
            Err(err) => {
                match &err {
                    TokenError::Malformed(reason) => {
                        warn!(client, reason = %reason, "Rejected malformed presign token")
                    }
                    TokenError::Expired | TokenError::InvalidSignature => {
                        warn!(client, error = %err, "Rejected presign token")
                    }
                }
                return Err(err.into());
            }
        };

        let key = blobs.key_for_path(Path::new(&token.path)).ok_or_else(|| {
            warn!(path = %token.path, "Signed path is outside the storage root");
            TokenError::Malformed("token path is not a storage path".to_string())
        })?;

        if key.client() != client {
            warn!(
                client,
                token_client = key.client(),
                "Presign token presented under another client"
            );
            return Err(AppError::Unauthorized(
                "token was not issued for this client".to_string(),
            ));
        }

        let stored = blobs.save(&key, body).await?;
        info!(
            client = key.client(),
            filename = key.filename(),
            size = body.len(),
            "Presigned upload stored"
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalBlobStore;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn config(secret: &str) -> PresignConfig {
        PresignConfig::new(secret, 300).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn setup() -> (PresignIssuer, PresignVerifier, LocalBlobStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let cfg = config("test-presign-secret");
        (
            PresignIssuer::from_config(&cfg),
            PresignVerifier::from_config(&cfg),
            LocalBlobStore::new(dir.path().join("storage")),
            dir,
        )
    }

    fn token_from_url(url: &str) -> &str {
        url.split("q=").nth(1).unwrap()
    }

    #[test]
    fn test_token_round_trip_through_encoding() {
        let (issuer, _, _, _dir) = setup();
        let token = issuer.issue(Path::new("./storage/acme/cat.png"), t0()).unwrap();

        assert_eq!(token.expires_at, 1_700_000_300);
        let encoded = token.encode();
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(PresignToken::decode(&encoded).unwrap(), token);
    }

    #[test]
    fn test_valid_until_expiry() {
        let (issuer, verifier, _, _dir) = setup();
        let token = issuer.issue(Path::new("./storage/acme/cat.png"), t0()).unwrap().encode();

        assert!(verifier.verify(&token, t0()).is_ok());
        assert!(verifier.verify(&token, t0() + Duration::seconds(299)).is_ok());
        assert_eq!(
            verifier.verify(&token, t0() + Duration::seconds(300)),
            Err(TokenError::Expired)
        );
        assert_eq!(
            verifier.verify(&token, t0() + Duration::hours(1)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_flipped_signature_bit_is_invalid() {
        let (issuer, verifier, _, _dir) = setup();
        let token = issuer.issue(Path::new("./storage/acme/cat.png"), t0()).unwrap();
        let mut signature = hex::decode(&token.signature).unwrap();

        for byte in 0..signature.len() {
            for bit in 0..8 {
                signature[byte] ^= 1 << bit;
                let tampered = PresignToken {
                    signature: hex::encode(&signature),
                    ..token.clone()
                };
                assert_eq!(
                    verifier.verify(&tampered.encode(), t0()),
                    Err(TokenError::InvalidSignature)
                );
                signature[byte] ^= 1 << bit;
            }
        }
    }

    #[test]
    fn test_tampered_expiry_is_invalid() {
        let (issuer, verifier, _, _dir) = setup();
        let token = issuer.issue(Path::new("./storage/acme/cat.png"), t0()).unwrap();
        let extended = PresignToken {
            expires_at: token.expires_at + 3600,
            ..token
        };
        assert_eq!(
            verifier.verify(&extended.encode(), t0()),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_other_secret_is_invalid() {
        let (issuer, _, _, _dir) = setup();
        let other = PresignVerifier::from_config(&config("a-different-secret"));
        let token = issuer.issue(Path::new("./storage/acme/cat.png"), t0()).unwrap().encode();
        assert_eq!(other.verify(&token, t0()), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_malformed_tokens() {
        let (_, verifier, _, _dir) = setup();
        let cases = [
            "%%%not-base64%%%".to_string(),
            TOKEN_ENGINE.encode("only-one-field"),
            TOKEN_ENGINE.encode("path|1700000300"),
            TOKEN_ENGINE.encode("path|soon|abcdef"),
            TOKEN_ENGINE.encode("|1700000300|abcdef"),
            TOKEN_ENGINE.encode([0xff, 0xfe, b'|', b'1', b'|', b'a']),
        ];
        for raw in cases {
            assert!(
                matches!(verifier.verify(&raw, t0()), Err(TokenError::Malformed(_))),
                "expected malformed for {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_padded_token_accepted() {
        let (issuer, verifier, _, _dir) = setup();
        let token = issuer.issue(Path::new("./storage/acme/a.png"), t0()).unwrap();
        let payload = format!("{}|{}|{}", token.path, token.expires_at, token.signature);
        let padded = base64::engine::general_purpose::URL_SAFE.encode(payload);
        assert!(verifier.verify(&padded, t0()).is_ok());
    }

    #[test]
    fn test_path_with_separator_verifies() {
        let (issuer, verifier, _, _dir) = setup();
        let token = issuer.issue(Path::new("./storage/acme/a|b.png"), t0()).unwrap();
        let verified = verifier.verify(&token.encode(), t0()).unwrap();
        assert_eq!(verified.path, "./storage/acme/a|b.png");
    }

    #[tokio::test]
    async fn test_redeem_writes_blob() {
        let (issuer, verifier, blobs, _dir) = setup();
        let key = BlobKey::parse("acme", "cat.png").unwrap();
        let url = issuer.upload_url(&blobs, &key, t0()).unwrap();
        assert!(url.starts_with("/presignedupload?client=acme&q="));

        let stored = verifier
            .redeem(&blobs, token_from_url(&url), "acme", b"meow", t0())
            .await
            .unwrap();

        assert_eq!(stored, blobs.path_for(&key));
        assert_eq!(blobs.open(&key).await.unwrap(), b"meow");
    }

    #[tokio::test]
    async fn test_redeem_is_replayable_until_expiry() {
        let (issuer, verifier, blobs, _dir) = setup();
        let key = BlobKey::parse("acme", "cat.png").unwrap();
        let url = issuer.upload_url(&blobs, &key, t0()).unwrap();
        let token = token_from_url(&url);

        verifier.redeem(&blobs, token, "acme", b"one", t0()).await.unwrap();
        verifier
            .redeem(&blobs, token, "acme", b"two", t0() + Duration::seconds(10))
            .await
            .unwrap();
        assert_eq!(blobs.open(&key).await.unwrap(), b"two");

        let err = verifier
            .redeem(&blobs, token, "acme", b"three", t0() + Duration::seconds(300))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Token(TokenError::Expired)));
        assert_eq!(blobs.open(&key).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_redeem_cannot_cross_into_other_namespace() {
        let (issuer, verifier, blobs, _dir) = setup();
        let acme = BlobKey::parse("acme", "cat.png").unwrap();
        let globex = BlobKey::parse("globex", "cat.png").unwrap();

        // Swap the signed path for globex's path, keeping acme's signature.
        let token = issuer.issue(&blobs.path_for(&acme), t0()).unwrap();
        let forged = PresignToken {
            path: blobs.path_for(&globex).display().to_string(),
            ..token.clone()
        };
        let err = verifier
            .redeem(&blobs, &forged.encode(), "globex", b"evil", t0())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Token(TokenError::InvalidSignature)));
        assert!(blobs.open(&globex).await.is_err());

        // A genuine acme token presented under globex's origin is refused too.
        let err = verifier
            .redeem(&blobs, &token.encode(), "globex", b"evil", t0())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(blobs.open(&acme).await.is_err());
    }

    #[test]
    fn test_issue_reports_unrepresentable_expiry() {
        let (issuer, _, _, _dir) = setup();
        let err = issuer
            .issue(Path::new("./storage/acme/cat.png"), DateTime::<Utc>::MAX_UTC)
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_redeem_surfaces_storage_failure() {
        let (issuer, verifier, blobs, _dir) = setup();
        // A regular file where the client directory should be.
        std::fs::create_dir_all(blobs.root()).unwrap();
        std::fs::write(blobs.root().join("acme"), b"in the way").unwrap();

        let key = BlobKey::parse("acme", "cat.png").unwrap();
        let url = issuer.upload_url(&blobs, &key, t0()).unwrap();
        let err = verifier
            .redeem(&blobs, token_from_url(&url), "acme", b"meow", t0())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_redeem_rejects_signed_path_outside_root() {
        let (issuer, verifier, blobs, _dir) = setup();
        let token = issuer.issue(Path::new("/etc/cron.d/job"), t0()).unwrap().encode();

        let err = verifier
            .redeem(&blobs, &token, "acme", b"x", t0())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Token(TokenError::Malformed(_))));
    }
}
