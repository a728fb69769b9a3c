// Request gates: API key + CORS, and origin-only CORS

pub mod auth;
pub mod cors;

pub use auth::*;
pub use cors::*;
