use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use super::blob_error;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PutBlobResponse {
    pub byte_size: u64,
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteBlobsRequest {
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteBlobsResponse {
    pub deleted: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Stream the request body into a new blob.
/// Route: PUT /blobs/*key
pub async fn put_blob(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    body: Body,
) -> Result<Json<JSend<PutBlobResponse>>, ApiError> {
    let mut blob = state.blobs.create(&key).map_err(blob_error)?;
    let mut body = body.into_data_stream();
    let mut byte_size: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                blob.discard();
                return Err(ApiError::bad_request(format!(
                    "Failed to read request body: {e}"
                )));
            }
        };

        byte_size += chunk.len() as u64;
        if byte_size > state.config.max_upload_size {
            blob.discard();
            return Err(ApiError::payload_too_large(format!(
                "Blob exceeds maximum upload size of {} bytes",
                state.config.max_upload_size
            )));
        }

        if let Err(e) = blob.write_all(&chunk).await {
            // The upload stopped consuming; commit reports why.
            return Err(match blob.commit().await {
                Err(err) => blob_error(err),
                Ok(()) => ApiError::internal(format!("Failed to write blob: {e}")),
            });
        }
    }

    blob.commit().await.map_err(blob_error)?;

    tracing::info!(key = blob.key(), byte_size, "Stored blob");

    Ok(JSend::success(PutBlobResponse { byte_size, key }))
}

/// Stream blob content back to the client.
/// Route: GET /blobs/*key
pub async fn get_blob(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let stream = state.blobs.open(&key).await.map_err(blob_error)?;

    let mut response = (StatusCode::OK, Body::from_stream(stream)).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/octet-stream"),
    );

    Ok(response)
}

/// Route: DELETE /blobs/*key
pub async fn delete_blob(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<JSend<DeleteBlobsResponse>>, ApiError> {
    state.blobs.delete(&key).await.map_err(blob_error)?;

    Ok(JSend::success(DeleteBlobsResponse { deleted: vec![key] }))
}

/// Delete a batch of blobs, attempting every key even if some fail.
/// Route: POST /batch-delete
pub async fn delete_blobs(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<DeleteBlobsRequest>,
) -> Result<Json<JSend<DeleteBlobsResponse>>, ApiError> {
    state
        .blobs
        .delete_many(&req.keys)
        .await
        .map_err(blob_error)?;

    Ok(JSend::success(DeleteBlobsResponse { deleted: req.keys }))
}
