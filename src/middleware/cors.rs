// Per-client CORS headers and the origin-only gate.
//
// The allowed origin comes from the client registry on every request;
// tower-http's static CorsLayer cannot express that, so headers are written
// here by hand.

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::warn;

use crate::db::ClientRegistry;
use crate::models::AppState;
use crate::storage::sanitize_client;
use crate::types::{AppError, AppResult};

/// Methods advertised by the origin gate on read endpoints.
pub const PUBLIC_READ_METHODS: &str = "GET, OPTIONS";
/// Methods advertised by the origin gate on the presigned upload endpoint.
pub const PUBLIC_UPLOAD_METHODS: &str = "PUT, POST, OPTIONS";
pub const PUBLIC_ALLOW_HEADERS: &str = "Content-Type";

#[derive(Debug, Default, Deserialize)]
struct ClientParam {
    #[serde(default)]
    client: String,
}

/// Sanitized `client` query parameter, empty when absent or unparseable.
pub fn client_param(uri: &Uri) -> String {
    Query::<ClientParam>::try_from_uri(uri)
        .map(|Query(param)| sanitize_client(&param.client))
        .unwrap_or_default()
}

/// The origin registered for `client`, if the client exists.
pub async fn lookup_origin(
    registry: &dyn ClientRegistry,
    client: &str,
) -> AppResult<Option<String>> {
    if client.is_empty() {
        return Ok(None);
    }
    registry.allowed_origin(client).await
}

/// Whether the request's `Origin` header is acceptable for `allowed`.
///
/// Requests without an `Origin` header (non-browser callers) pass; CORS
/// only constrains browsers.
pub fn origin_permitted(headers: &HeaderMap, allowed: &str) -> bool {
    if allowed == "*" {
        return true;
    }
    match headers.get(header::ORIGIN) {
        None => true,
        Some(value) => value.as_bytes() == allowed.as_bytes(),
    }
}

/// CORS response headers for one request.
#[derive(Debug, Clone)]
pub struct CorsHeaders {
    pub allow_origin: Option<String>,
    pub allow_methods: &'static str,
    pub allow_headers: &'static str,
}

impl CorsHeaders {
    pub fn apply(&self, mut response: Response) -> Response {
        let headers = response.headers_mut();
        if let Some(origin) = &self.allow_origin {
            match HeaderValue::from_str(origin) {
                Ok(value) => {
                    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
                }
                Err(_) => warn!(origin = %origin, "Registered origin is not a valid header value"),
            }
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(self.allow_methods),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(self.allow_headers),
        );
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        response
    }
}

pub async fn origin_gate_read(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    origin_gate(&state, PUBLIC_READ_METHODS, req, next).await
}

pub async fn origin_gate_upload(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    origin_gate(&state, PUBLIC_UPLOAD_METHODS, req, next).await
}

async fn origin_gate(
    state: &AppState,
    allow_methods: &'static str,
    req: Request,
    next: Next,
) -> Response {
    let client = client_param(req.uri());
    let mut cors = CorsHeaders {
        allow_origin: None,
        allow_methods,
        allow_headers: PUBLIC_ALLOW_HEADERS,
    };

    let allowed = match lookup_origin(state.registry.as_ref(), &client).await {
        Ok(allowed) => allowed,
        Err(err) => return cors.apply(err.into_response()),
    };
    cors.allow_origin = allowed.clone();

    if req.method() == Method::OPTIONS {
        return cors.apply(StatusCode::NO_CONTENT.into_response());
    }

    let Some(allowed) = allowed else {
        warn!(client = %client, "Public request for unknown client");
        return cors.apply(AppError::Unauthorized("unknown client".to_string()).into_response());
    };
    if !origin_permitted(req.headers(), &allowed) {
        warn!(client = %client, "Public request from a foreign origin");
        return cors.apply(
            AppError::Unauthorized("origin not allowed".to_string()).into_response(),
        );
    }

    cors.apply(next.run(req).await)
}
