//! Key-addressed blob storage on top of an [`ObjectStore`] backend.

mod writer;

pub use writer::{BlobWriter, HandleState};

use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, error};

use crate::object_store::{ByteStream, ObjectStore, ObjectStoreError};
use crate::pipe;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("No such blob: {0}")]
    NoSuchBlob(String),
    #[error("Upload of blob {key} failed: {source}")]
    UploadFailed {
        key: String,
        #[source]
        source: ObjectStoreError,
    },
    #[error("Blob handle misuse: {0}")]
    HandleMisuse(&'static str),
    #[error(transparent)]
    Backend(#[from] ObjectStoreError),
    #[error("Cannot start upload task: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

/// A blob store bound to one backend and one key prefix.
///
/// Cheap to share behind an `Arc`; every operation only reads its fields.
pub struct BlobStore {
    backend: Arc<dyn ObjectStore>,
    prefix: String,
}

impl BlobStore {
    pub fn new(backend: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn object_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Start writing a new blob.
    ///
    /// The upload to the backend begins immediately in a background task and
    /// consumes bytes as they are written to the returned handle. Backend
    /// failures surface from [`BlobWriter::commit`], never from here.
    pub fn create(&self, key: &str) -> Result<BlobWriter, BlobError> {
        let runtime = tokio::runtime::Handle::try_current()?;

        let (writer, reader) = pipe::pipe(pipe::DEFAULT_CAPACITY);
        let closer = reader.closer();
        let (outcome_tx, outcome_rx) = tokio::sync::oneshot::channel();

        let backend = Arc::clone(&self.backend);
        let object_key = self.object_key(key);

        runtime.spawn(async move {
            debug!(key = %object_key, "Starting streaming upload");
            let result = backend.put(&object_key, reader.boxed()).await;
            match &result {
                Ok(()) => debug!(key = %object_key, "Streaming upload finished"),
                Err(e) => {
                    debug!(key = %object_key, error = %e, "Streaming upload failed");
                    closer.close_with_error(std::io::Error::other(format!(
                        "upload of {object_key} failed: {e}"
                    )));
                }
            }
            // Nobody is listening if the handle was dropped; that's fine.
            let _ = outcome_tx.send(result);
        });

        Ok(BlobWriter::new(key.to_string(), writer, outcome_rx))
    }

    /// Open a blob for reading. Bytes are fetched lazily as the stream is
    /// polled.
    pub async fn open(&self, key: &str) -> Result<ByteStream, BlobError> {
        self.backend
            .get(&self.object_key(key))
            .await
            .map_err(|e| match e {
                ObjectStoreError::NotFound(_) => BlobError::NoSuchBlob(key.to_string()),
                other => BlobError::Backend(other),
            })
    }

    pub async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.backend.delete(&self.object_key(key)).await?;
        Ok(())
    }

    /// Delete every key in order, carrying on past failures.
    ///
    /// Each failure is logged as it happens; only the last one is returned.
    pub async fn delete_many<I, K>(&self, keys: I) -> Result<(), BlobError>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut last_err = None;
        for key in keys {
            let object_key = self.object_key(key.as_ref());
            if let Err(e) = self.backend.delete(&object_key).await {
                error!(key = %object_key, error = %e, "Failed to delete object");
                last_err = Some(e);
            }
        }

        match last_err {
            Some(e) => Err(BlobError::Backend(e)),
            None => Ok(()),
        }
    }
}
