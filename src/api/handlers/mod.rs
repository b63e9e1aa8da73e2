mod admin;
mod blobs;

use crate::api::response::ApiError;
use crate::blob::BlobError;

pub use admin::health;
pub use blobs::{delete_blob, delete_blobs, get_blob, put_blob};

/// Map a BlobError to an ApiError
fn blob_error(e: BlobError) -> ApiError {
    match e {
        BlobError::NoSuchBlob(key) => ApiError::not_found(format!("Blob not found: {key}")),
        BlobError::UploadFailed { .. } | BlobError::Backend(_) => {
            ApiError::bad_gateway(e.to_string())
        }
        BlobError::HandleMisuse(_) | BlobError::Runtime(_) => ApiError::internal(e.to_string()),
    }
}
