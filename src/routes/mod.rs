//! HTTP Routes
//!
//! - `POST /upload`, `DELETE /delete`, `GET /list`, `GET /presignurl`:
//!   API key + per-client CORS (auth gate)
//! - `GET /download`, `PUT /presignedupload`:
//!   per-client CORS only (origin gate)
//! - `GET /health`: no gate

pub mod files;
pub mod health;
pub mod presign;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    Router::new()
        .merge(files::router(state.clone()))
        .merge(presign::router(state.clone()))
        .merge(health::router(state))
        .layer(TraceLayer::new_for_http())
}
