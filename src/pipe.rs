//! In-process byte pipe that feeds a streaming upload.
//!
//! A bounded single-producer/single-consumer relay: [`PipeWriter`] is an
//! `AsyncWrite`, [`PipeReader`] is a `Stream` of byte chunks. Either side may
//! close with an error, which the other side observes instead of a clean end.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::sync::PollSender;

/// Chunks the writer may queue ahead of the reader.
pub const DEFAULT_CAPACITY: usize = 1;

/// Largest chunk a single `poll_write` hands to the reader.
pub const MAX_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Default)]
struct Shared {
    /// Set by the writer before it drops its sender.
    writer_error: Mutex<Option<(io::ErrorKind, String)>>,
    /// Set by the reader side when the consumer gives up.
    reader_error: Mutex<Option<(io::ErrorKind, String)>>,
}

fn record(slot: &Mutex<Option<(io::ErrorKind, String)>>, err: &io::Error) {
    let mut slot = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if slot.is_none() {
        *slot = Some((err.kind(), err.to_string()));
    }
}

fn recorded(slot: &Mutex<Option<(io::ErrorKind, String)>>) -> Option<io::Error> {
    let slot = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    slot.as_ref()
        .map(|(kind, message)| io::Error::new(*kind, message.clone()))
}

/// Create a connected pipe that lets at most `capacity` chunks sit unread.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let shared = Arc::new(Shared::default());
    (
        PipeWriter {
            tx: Some(PollSender::new(tx)),
            shared: Arc::clone(&shared),
        },
        PipeReader {
            rx,
            shared,
            done: false,
        },
    )
}

/// Write end of a [`pipe`].
pub struct PipeWriter {
    tx: Option<PollSender<Bytes>>,
    shared: Arc<Shared>,
}

impl PipeWriter {
    /// Close cleanly. The reader drains what is queued and then sees EOF.
    pub fn close(&mut self) {
        self.tx = None;
    }

    /// Close with an error. The reader drains what is queued and then yields
    /// `err` instead of EOF.
    pub fn close_with_error(&mut self, err: io::Error) {
        if self.tx.is_none() {
            return;
        }
        record(&self.shared.writer_error, &err);
        self.tx = None;
    }

    fn broken(&self) -> io::Error {
        recorded(&self.shared.reader_error)
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed"))
    }
}

impl AsyncWrite for PipeWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let Some(tx) = this.tx.as_mut() else {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe writer closed",
            )));
        };

        if ready!(tx.poll_reserve(cx)).is_err() {
            return Poll::Ready(Err(this.broken()));
        }

        let len = buf.len().min(MAX_CHUNK_SIZE);
        if tx.send_item(Bytes::copy_from_slice(&buf[..len])).is_err() {
            return Poll::Ready(Err(this.broken()));
        }
        Poll::Ready(Ok(len))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().close();
        Poll::Ready(Ok(()))
    }
}

/// Read end of a [`pipe`].
pub struct PipeReader {
    rx: mpsc::Receiver<Bytes>,
    shared: Arc<Shared>,
    done: bool,
}

impl PipeReader {
    /// A handle that fails the write side with a given error once the reader
    /// has been handed off and dropped.
    ///
    /// Writes that observe the closed channel before the error is recorded
    /// fail with `BrokenPipe` instead.
    pub fn closer(&self) -> PipeCloser {
        PipeCloser {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Stream for PipeReader {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match ready!(this.rx.poll_recv(cx)) {
            Some(chunk) => Poll::Ready(Some(Ok(chunk))),
            None => {
                this.done = true;
                Poll::Ready(recorded(&this.shared.writer_error).map(Err))
            }
        }
    }
}

/// Detached reader-side error close, see [`PipeReader::closer`].
#[derive(Clone)]
pub struct PipeCloser {
    shared: Arc<Shared>,
}

impl PipeCloser {
    /// Pending and future writes fail with `err` instead of `BrokenPipe`.
    pub fn close_with_error(&self, err: io::Error) {
        record(&self.shared.reader_error, &err);
    }
}
