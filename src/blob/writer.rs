use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;
use tokio::sync::oneshot;
use tracing::{error, warn};

use super::BlobError;
use crate::object_store::ObjectStoreError;
use crate::pipe::PipeWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Accepting writes.
    Open,
    /// `commit` has been called. Its outcome was returned to the caller.
    Committed,
    /// Closed without commit. The upload was aborted.
    Abandoned,
}

/// Write handle for one blob being created.
///
/// Bytes written through [`AsyncWrite`] are streamed to the backend as they
/// arrive. Call [`commit`](Self::commit) exactly once to finish the blob and
/// learn whether the upload succeeded. Dropping the handle without committing
/// aborts the upload, and the partial object is never stored.
///
/// `poll_shutdown` does not commit; only `commit` does.
pub struct BlobWriter {
    key: String,
    pipe: PipeWriter,
    outcome: oneshot::Receiver<Result<(), ObjectStoreError>>,
    state: HandleState,
}

impl BlobWriter {
    pub(super) fn new(
        key: String,
        pipe: PipeWriter,
        outcome: oneshot::Receiver<Result<(), ObjectStoreError>>,
    ) -> Self {
        Self {
            key,
            pipe,
            outcome,
            state: HandleState::Open,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Finish the blob and wait for the upload to complete.
    ///
    /// Valid once per handle. Any later call, or a call after
    /// [`discard`](Self::discard), returns [`BlobError::HandleMisuse`].
    pub async fn commit(&mut self) -> Result<(), BlobError> {
        match self.state {
            HandleState::Open => {}
            HandleState::Committed => {
                return Err(BlobError::HandleMisuse("commit called twice on a blob handle"))
            }
            HandleState::Abandoned => {
                return Err(BlobError::HandleMisuse(
                    "commit called on a discarded blob handle",
                ))
            }
        }

        self.state = HandleState::Committed;
        self.pipe.close();

        let result = match (&mut self.outcome).await {
            Ok(result) => result,
            Err(_) => Err(ObjectStoreError::Backend(
                "upload task terminated without reporting an outcome".to_string(),
            )),
        };

        result.map_err(|source| {
            error!(key = %self.key, error = %source, "Blob upload failed");
            BlobError::UploadFailed {
                key: self.key.clone(),
                source,
            }
        })
    }

    /// Abandon the blob. The in-flight upload is aborted instead of being
    /// completed with truncated data. No-op once committed or discarded.
    pub fn discard(&mut self) {
        if self.state != HandleState::Open {
            return;
        }
        self.state = HandleState::Abandoned;
        warn!(key = %self.key, "Blob handle closed without commit");
        self.pipe
            .close_with_error(io::Error::other("handle closed without commit"));
    }
}

impl Drop for BlobWriter {
    fn drop(&mut self) {
        self.discard();
    }
}

impl AsyncWrite for BlobWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.state != HandleState::Open {
            return Poll::Ready(Err(io::Error::other("blob handle is closed")));
        }
        Pin::new(&mut this.pipe).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().pipe).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
