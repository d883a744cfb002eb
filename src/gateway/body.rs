//! # Streamed Upload Body
//!
//! An upload is never buffered in full. The file arrives as a stream of
//! chunks and leaves as a stream of chunks; [`FileBody::limited`] wraps it
//! so that the configured size limit is enforced on the bytes that actually
//! flow, not only on the size the client declared.

use actix_web::web::Bytes;
use futures_util::stream::{self, Stream};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

type ChunkStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync + 'static>>;

/// The single-read byte stream of an [`IncomingFile`](super::IncomingFile).
pub struct FileBody {
    inner: ChunkStream,
}

impl FileBody {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
    {
        Self { inner: Box::pin(stream) }
    }

    #[cfg(test)]
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::from_stream(stream::iter(vec![Ok(bytes.into())]))
    }

    pub fn empty() -> Self {
        Self::from_stream(stream::empty())
    }

    /// Consume the body, returning a stream that fails once more than
    /// `max_bytes` have passed through, plus a guard that reports whether
    /// that happened.
    pub fn limited(self, max_bytes: u64) -> (LimitedStream, BodyGuard) {
        let guard = BodyGuard::default();
        let stream = LimitedStream {
            inner: self.inner,
            max_bytes,
            guard: guard.clone(),
            done: false,
        };
        (stream, guard)
    }
}

/// Shared view of how much of a body has been streamed.
#[derive(Debug, Clone, Default)]
pub struct BodyGuard {
    seen: Arc<AtomicU64>,
    overflowed: Arc<AtomicBool>,
    source_failed: Arc<AtomicBool>,
}

impl BodyGuard {
    pub fn bytes_seen(&self) -> u64 {
        self.seen.load(Ordering::Acquire)
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Acquire)
    }

    /// The inbound side broke (malformed part, client went away) before the
    /// body was complete.
    pub fn source_failed(&self) -> bool {
        self.source_failed.load(Ordering::Acquire)
    }
}

pub struct LimitedStream {
    inner: ChunkStream,
    max_bytes: u64,
    guard: BodyGuard,
    done: bool,
}

impl Stream for LimitedStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                let seen = self
                    .guard
                    .seen
                    .fetch_add(chunk.len() as u64, Ordering::AcqRel)
                    + chunk.len() as u64;
                if seen > self.max_bytes {
                    self.guard.overflowed.store(true, Ordering::Release);
                    self.done = true;
                    return Poll::Ready(Some(Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("upload exceeded {} bytes", self.max_bytes),
                    ))));
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.guard.source_failed.store(true, Ordering::Release);
                self.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
