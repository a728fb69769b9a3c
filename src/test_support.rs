use std::sync::Arc;
use tempfile::TempDir;

use crate::config::{Config, DatabaseConfig, PresignConfig, ServerConfig, StorageConfig};
use crate::db::{memory_pool, SqliteClientRegistry};
use crate::models::{AppState, ClientRecord};
use crate::presign::{PresignIssuer, PresignVerifier};
use crate::storage::LocalBlobStore;

pub const TEST_PRESIGN_SECRET: &str = "test-presign-secret";

/// State backed by an in-memory registry and a temporary blob root. Keep the
/// returned directory alive for the duration of the test.
pub async fn build_state() -> (AppState, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let storage_root = dir.path().join("storage");
    let presign = PresignConfig::new(TEST_PRESIGN_SECRET, 300).expect("presign config");

    let config = Config {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
            max_upload_bytes: 1024 * 1024,
            max_resize_dimension: 512,
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        storage: StorageConfig {
            root: storage_root.clone(),
        },
        presign: presign.clone(),
    };

    let state = AppState {
        registry: Arc::new(SqliteClientRegistry::new(memory_pool().await)),
        blobs: Arc::new(LocalBlobStore::new(storage_root)),
        issuer: PresignIssuer::from_config(&presign),
        verifier: PresignVerifier::from_config(&presign),
        config,
    };
    (state, dir)
}

pub async fn register(state: &AppState, client_id: &str, api_key: &str, origin: &str) {
    state
        .registry
        .insert(&ClientRecord {
            client_id: client_id.to_string(),
            api_key: api_key.to_string(),
            allowed_origin: origin.to_string(),
        })
        .await
        .expect("register client");
}
