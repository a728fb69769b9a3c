// API key + origin gate for mutating and listing endpoints

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::cors::{client_param, origin_permitted, CorsHeaders};
use crate::models::{AppState, ClientRecord};
use crate::presign::crypto::constant_time_eq;
use crate::types::{AppError, AppResult};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const AUTH_ALLOW_METHODS: &str = "GET, POST, DELETE, OPTIONS";
pub const AUTH_ALLOW_HEADERS: &str = "Content-Type, x-api-key";

/// CORS headers are computed before the key is checked, so preflights and
/// rejections carry the same headers as successful responses. `OPTIONS`
/// never reaches the handler. The registry is read once; the same record
/// supplies the CORS origin and the key.
pub async fn auth_gate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_param(req.uri());
    let mut cors = CorsHeaders {
        allow_origin: None,
        allow_methods: AUTH_ALLOW_METHODS,
        allow_headers: AUTH_ALLOW_HEADERS,
    };

    let record = if client.is_empty() {
        None
    } else {
        match state.registry.lookup(&client).await {
            Ok(record) => record,
            Err(err) => return cors.apply(err.into_response()),
        }
    };
    cors.allow_origin = record.as_ref().map(|r| r.allowed_origin.clone());

    if req.method() == Method::OPTIONS {
        return cors.apply(StatusCode::NO_CONTENT.into_response());
    }

    if let Err(err) = authenticate(&client, record.as_ref(), req.headers()) {
        return cors.apply(err.into_response());
    }

    cors.apply(next.run(req).await)
}

fn authenticate(
    client: &str,
    record: Option<&ClientRecord>,
    headers: &HeaderMap,
) -> AppResult<()> {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if client.is_empty() || api_key.is_empty() {
        return Err(AppError::Unauthorized(
            "Missing client or API key".to_string(),
        ));
    }

    let Some(record) = record else {
        warn!(client, "Authentication failed: unknown client");
        return Err(AppError::Unauthorized("invalid client or API key".to_string()));
    };

    if !constant_time_eq(record.api_key.as_bytes(), api_key.as_bytes()) {
        warn!(client, "Authentication failed: API key mismatch");
        return Err(AppError::Unauthorized("invalid client or API key".to_string()));
    }

    if !origin_permitted(headers, &record.allowed_origin) {
        warn!(client, "Authentication failed: origin not allowed");
        return Err(AppError::Unauthorized("origin not allowed".to_string()));
    }

    debug!(client, "Client authenticated");
    Ok(())
}
