use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::{header, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::{error, info};

use crate::middleware::{auth_gate, origin_gate_read};
use crate::models::{AppState, DownloadQuery, FileQuery, MessageResponse, UploadResponse};
use crate::resize;
use crate::storage::{sanitize_client, BlobKey};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/upload", post(upload_file))
        .route("/delete", delete(delete_file))
        .route("/list", get(list_files))
        .route_layer(from_fn_with_state(state.clone(), auth_gate));

    let public = Router::new()
        .route("/download", get(download_file))
        .route_layer(from_fn_with_state(state.clone(), origin_gate_read));

    authenticated
        .merge(public)
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .with_state(state)
}

async fn upload_file(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let key = BlobKey::parse(&query.client, &query.filename)?;

    let path = state.blobs.save(&key, &body).await.map_err(|e| {
        error!(client = key.client(), filename = key.filename(), "Upload failed: {}", e);
        AppError::from(e)
    })?;

    info!(
        client = key.client(),
        filename = key.filename(),
        size = body.len(),
        "Upload stored"
    );
    Ok((StatusCode::CREATED, Json(UploadResponse::uploaded(&path))))
}

async fn download_file(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> AppResult<impl IntoResponse> {
    let key = BlobKey::parse(&query.client, &query.filename)?;
    let bytes = state.blobs.open(&key).await?;

    let filename = key.filename().to_string();
    let (width, height) = (query.width, query.height);
    let max_dimension = state.config.server.max_resize_dimension;
    let rendered = tokio::task::spawn_blocking(move || {
        resize::render(bytes, &filename, width, height, max_dimension)
    })
    .await
    .map_err(|e| AppError::Internal(format!("resize task failed: {}", e)))??;

    match rendered.dimensions {
        Some((w, h)) => info!(
            client = key.client(),
            filename = key.filename(),
            "Download in changed dimensions -> {}x{}",
            w,
            h
        ),
        None => info!(
            client = key.client(),
            filename = key.filename(),
            "Download in original dimensions"
        ),
    }

    Ok((
        [(header::CONTENT_TYPE, rendered.content_type)],
        rendered.bytes,
    ))
}

async fn delete_file(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> AppResult<Json<MessageResponse>> {
    let key = BlobKey::parse(&query.client, &query.filename)?;
    state.blobs.delete(&key).await?;

    info!(client = key.client(), filename = key.filename(), "Deleted");
    Ok(Json(MessageResponse {
        message: "deleted".to_string(),
    }))
}

async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> AppResult<Json<Vec<String>>> {
    let client = sanitize_client(&query.client);
    if client.is_empty() {
        return Err(AppError::Validation("client required".to_string()));
    }

    Ok(Json(state.blobs.list(&client).await?))
}
