// Handradi - multi-tenant file storage with presigned uploads

pub mod config;
pub mod db;
pub mod models;
pub mod types;
pub mod storage;
pub mod presign;   // Stateless signed upload tokens
pub mod resize;    // Download-time image resizing
pub mod routes;
pub mod middleware;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
