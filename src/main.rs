use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use handradi::{
    config::Config,
    db::{ClientRegistry, SqliteClientRegistry},
    presign::{PresignIssuer, PresignVerifier},
    routes::create_router,
    storage::LocalBlobStore,
    utils::{init_tracing, shutdown_signal},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("handradi=debug,tower_http=debug");

    // Load configuration; refuses to start without a presign secret
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    // Open the client registry
    let pool = handradi::db::create_pool(&config.database).await?;
    let registry = Arc::new(SqliteClientRegistry::new(pool));
    info!("Client registry ready at {}", config.database.url);

    tokio::fs::create_dir_all(&config.storage.root).await?;
    info!("Storing blobs under {}", config.storage.root.display());

    // Create shared state
    let state = AppState {
        registry: registry.clone(),
        blobs: Arc::new(LocalBlobStore::new(config.storage.root.clone())),
        issuer: PresignIssuer::from_config(&config.presign),
        verifier: PresignVerifier::from_config(&config.presign),
        config: config.clone(),
    };

    let app = create_router(state);

    // Start server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    info!("📦 File server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    registry.close().await;
    info!("Client registry closed");

    Ok(())
}
