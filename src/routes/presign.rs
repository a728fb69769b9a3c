use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use bytes::Bytes;
use chrono::Utc;

use crate::middleware::{auth_gate, origin_gate_upload};
use crate::models::{AppState, FileQuery, PresignResponse, PresignedUploadQuery, UploadResponse};
use crate::presign::PRESIGNED_UPLOAD_PATH;
use crate::storage::{sanitize_client, BlobKey};
use crate::types::{AppResult, TokenError};

pub fn router(state: AppState) -> Router {
    let issue = Router::new()
        .route("/presignurl", get(issue_presigned_url).post(issue_presigned_url))
        .route_layer(from_fn_with_state(state.clone(), auth_gate));

    let consume = Router::new()
        .route(
            PRESIGNED_UPLOAD_PATH,
            put(presigned_upload).post(presigned_upload),
        )
        .route_layer(from_fn_with_state(state.clone(), origin_gate_upload));

    issue
        .merge(consume)
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .with_state(state)
}

async fn issue_presigned_url(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> AppResult<Json<PresignResponse>> {
    let key = BlobKey::parse(&query.client, &query.filename)?;
    let url = state
        .issuer
        .upload_url(state.blobs.as_ref(), &key, Utc::now())?;
    Ok(Json(PresignResponse { url }))
}

async fn presigned_upload(
    State(state): State<AppState>,
    Query(query): Query<PresignedUploadQuery>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    if query.q.is_empty() {
        return Err(TokenError::Malformed("missing token".to_string()).into());
    }
    let client = sanitize_client(&query.client);

    let path = state
        .verifier
        .redeem(state.blobs.as_ref(), &query.q, &client, &body, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(UploadResponse::uploaded(&path))))
}
