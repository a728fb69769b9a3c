use std::sync::Arc;

use crate::config::Config;
use crate::db::ClientRegistry;
use crate::presign::{PresignIssuer, PresignVerifier};
use crate::storage::BlobStore;

/// Everything a request handler may touch. Built once at startup and
/// read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub registry: Arc<dyn ClientRegistry>,
    pub blobs: Arc<dyn BlobStore>,
    pub issuer: PresignIssuer,
    pub verifier: PresignVerifier,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct ClientRecord {
    pub client_id: String,
    pub api_key: String,
    pub allowed_origin: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub path: String,
}

impl UploadResponse {
    pub fn uploaded(path: &std::path::Path) -> Self {
        Self {
            message: "uploaded".to_string(),
            path: path.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PresignResponse {
    pub url: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub registry: String,
}

/// Query parameters shared by the file endpoints.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct FileQuery {
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub width: Option<u32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub height: Option<u32>,
}

// `?width=` counts as absent rather than as a parse failure.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct PresignedUploadQuery {
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub q: String,
}
