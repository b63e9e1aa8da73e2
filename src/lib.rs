//! blobstore - Key-addressed blob storage over S3-compatible object stores
//!
//! This crate provides:
//! - Streaming blob writes: bytes flow into the backend upload as they are
//!   written, and a single commit reports the upload's outcome
//! - Swappable object storage backends (S3-compatible, local filesystem)
//! - Batch deletes that carry on past individual failures
//! - REST API streaming blobs in and out

pub mod api;
pub mod blob;
pub mod config;
pub mod object_store;
pub mod pipe;
#[cfg(test)]
pub mod testutil;

use config::Config;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub blobs: blob::BlobStore,
}
