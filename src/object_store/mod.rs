mod local;
mod s3;
pub mod sigv4;

pub use local::LocalStore;
pub use s3::{S3Options, S3Store};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

/// A lazily produced sequence of byte chunks. An `Err` item ends the stream
/// with a failure; the stream ending without one means the data is complete.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Invalid backend configuration: {0}")]
    Config(String),
}

/// Abstraction over object storage backends.
/// Keys reach the backend as-is; any prefixing happens in the caller.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stream `data` into a single object. The length is not known up front.
    async fn put(&self, key: &str, data: ByteStream) -> Result<(), ObjectStoreError>;
    async fn get(&self, key: &str) -> Result<ByteStream, ObjectStoreError>;
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
}
