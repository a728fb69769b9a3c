use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_MAX_RESIZE_DIMENSION: u32 = 4096;
/// Upper bound on presigned URL lifetime (7 days).
pub const MAX_PRESIGN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub presign: PresignConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub max_upload_bytes: usize,
    /// Largest width or height a download may be resized to.
    pub max_resize_dimension: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub root: PathBuf,
}

#[derive(Clone, Deserialize)]
pub struct PresignConfig {
    pub secret: String,
    pub ttl_secs: i64,
}

// Keep the signing secret out of startup logs.
impl std::fmt::Debug for PresignConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresignConfig")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl Config {
    /// Load the server configuration from the environment (and `.env`, if present).
    ///
    /// Fails when `PRESIGN_SECRET` is unset or empty: presigned URLs must never
    /// be signed with a well-known key.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                port: env::var("HANDRADI_PORT")
                    .unwrap_or_else(|_| "8888".to_string())
                    .parse()
                    .context("HANDRADI_PORT must be a valid port number")?,
                host: env::var("HANDRADI_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                    .unwrap_or_else(|_| (64 * 1024 * 1024).to_string())
                    .parse()
                    .context("MAX_UPLOAD_BYTES must be a byte count")?,
                max_resize_dimension: env::var("MAX_RESIZE_DIMENSION")
                    .unwrap_or_else(|_| DEFAULT_MAX_RESIZE_DIMENSION.to_string())
                    .parse()
                    .context("MAX_RESIZE_DIMENSION must be a pixel count")?,
            },
            database: DatabaseConfig::from_env()?,
            storage: StorageConfig {
                root: env::var("STORAGE_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./storage")),
            },
            presign: PresignConfig::from_env()?,
        })
    }
}

impl DatabaseConfig {
    /// Registry settings only; the admin CLI needs these without a presign secret.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            url: env::var("CLIENTS_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://./clients/clients.db".to_string()),
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("DB_MAX_CONNECTIONS must be an integer")?,
        })
    }
}

impl PresignConfig {
    pub fn from_env() -> Result<Self> {
        let secret = env::var("PRESIGN_SECRET").unwrap_or_default();
        let ttl_secs = env::var("PRESIGN_TTL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .context("PRESIGN_TTL_SECS must be an integer number of seconds")?;
        Self::new(secret, ttl_secs)
    }

    pub fn new(secret: impl Into<String>, ttl_secs: i64) -> Result<Self> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            bail!("PRESIGN_SECRET must be set to a non-empty value");
        }
        if ttl_secs <= 0 || ttl_secs > MAX_PRESIGN_TTL_SECS {
            bail!(
                "PRESIGN_TTL_SECS must be between 1 and {}, got {}",
                MAX_PRESIGN_TTL_SECS,
                ttl_secs
            );
        }
        Ok(Self { secret, ttl_secs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presign_config_rejects_empty_secret() {
        assert!(PresignConfig::new("", 300).is_err());
        assert!(PresignConfig::new("   ", 300).is_err());
    }

    #[test]
    fn test_presign_config_rejects_non_positive_ttl() {
        assert!(PresignConfig::new("s3cret", 0).is_err());
        assert!(PresignConfig::new("s3cret", -5).is_err());
    }

    #[test]
    fn test_presign_config_caps_ttl() {
        assert!(PresignConfig::new("s3cret", MAX_PRESIGN_TTL_SECS).is_ok());
        assert!(PresignConfig::new("s3cret", MAX_PRESIGN_TTL_SECS + 1).is_err());
        assert!(PresignConfig::new("s3cret", 10_000_000_000_000).is_err());
    }

    #[test]
    fn test_presign_config_debug_redacts_secret() {
        let config = PresignConfig::new("super-secret-value", 300).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("ttl_secs"));
    }
}
