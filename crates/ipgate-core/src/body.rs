//! Cancellation-aware response body
//!
//! [`CancellableBody`] wraps an upstream [`ByteStream`] and races every read
//! against the request's cancellation token. When the token fires the
//! upstream stream is dropped, which aborts any read in flight, and the body
//! ends. However the body finishes (completion, error, cancellation, or the
//! server dropping it when the client disconnects) it is finalized exactly
//! once and the request token is cancelled.

use crate::fetch::ByteStream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use pin_project_lite::pin_project;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFutureOwned};
use tracing::{debug, warn};

/// How a body finished
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyOutcome {
    Completed,
    Failed,
    Cancelled,
    /// Dropped before reaching the end (client went away)
    Aborted,
}

struct Finalizer {
    label: String,
    bytes: u64,
    chunks: u64,
    outcome: Option<BodyOutcome>,
    guard: Option<DropGuard>,
}

impl Finalizer {
    fn finish(&mut self, outcome: BodyOutcome) {
        if self.outcome.is_some() {
            return;
        }
        self.outcome = Some(outcome);
        debug!(
            path = %self.label,
            bytes = self.bytes,
            chunks = self.chunks,
            outcome = ?outcome,
            "response body finalized"
        );
        // releasing the guard cancels the request token
        self.guard.take();
    }
}

impl Drop for Finalizer {
    fn drop(&mut self) {
        self.finish(BodyOutcome::Aborted);
    }
}

pin_project! {
    /// Response body that stops reading upstream once the request is cancelled
    pub struct CancellableBody {
        #[pin]
        cancelled: WaitForCancellationFutureOwned,
        inner: Option<ByteStream>,
        finalizer: Finalizer,
    }
}

impl CancellableBody {
    /// Wrap `body`; `label` identifies the response in logs
    pub fn new(body: ByteStream, cancel: CancellationToken, label: impl Into<String>) -> Self {
        Self {
            cancelled: cancel.clone().cancelled_owned(),
            inner: Some(body),
            finalizer: Finalizer {
                label: label.into(),
                bytes: 0,
                chunks: 0,
                outcome: None,
                guard: Some(cancel.drop_guard()),
            },
        }
    }

    /// Outcome once the body has finished
    pub fn outcome(&self) -> Option<BodyOutcome> {
        self.finalizer.outcome
    }
}

impl Stream for CancellableBody {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if this.inner.is_none() {
            return Poll::Ready(None);
        }

        if this.cancelled.poll(cx).is_ready() {
            debug!(path = %this.finalizer.label, "request cancelled, dropping upstream");
            *this.inner = None;
            this.finalizer.finish(BodyOutcome::Cancelled);
            return Poll::Ready(None);
        }

        let polled = match this.inner.as_mut() {
            Some(inner) => inner.poll_next_unpin(cx),
            None => return Poll::Ready(None),
        };

        match polled {
            Poll::Ready(Some(Ok(chunk))) => {
                this.finalizer.bytes += chunk.len() as u64;
                this.finalizer.chunks += 1;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                warn!(path = %this.finalizer.label, error = %e, "upstream read failed");
                *this.inner = None;
                this.finalizer.finish(BodyOutcome::Failed);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                *this.inner = None;
                this.finalizer.finish(BodyOutcome::Completed);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn chunks(parts: &[&'static str]) -> Vec<io::Result<Bytes>> {
        parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect()
    }

    #[tokio::test]
    async fn test_passes_chunks_in_order() {
        let cancel = CancellationToken::new();
        let upstream: ByteStream = stream::iter(chunks(&["a", "b", "c"])).boxed();
        let mut body = Box::pin(CancellableBody::new(upstream, cancel.clone(), "/ipfs/bafy"));

        let mut collected = Vec::new();
        while let Some(chunk) = body.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }

        assert_eq!(collected, b"abc");
        assert_eq!(body.outcome(), Some(BodyOutcome::Completed));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancellation_stops_and_drops_upstream() {
        let cancel = CancellationToken::new();
        let dropped = Arc::new(AtomicBool::new(false));
        let marker = SetOnDrop(dropped.clone());
        let upstream: ByteStream = stream::iter(chunks(&["first"]))
            .chain(stream::pending())
            .map(move |chunk| {
                let _keep = &marker;
                chunk
            })
            .boxed();
        let mut body = Box::pin(CancellableBody::new(upstream, cancel.clone(), "/ipfs/bafy"));

        assert_eq!(body.next().await.unwrap().unwrap(), "first");
        cancel.cancel();

        assert!(body.next().await.is_none());
        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(body.outcome(), Some(BodyOutcome::Cancelled));
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn test_upstream_error_ends_body() {
        let upstream: ByteStream = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::other("connection reset")),
            Ok(Bytes::from_static(b"never")),
        ])
        .boxed();
        let mut body = Box::pin(CancellableBody::new(upstream, CancellationToken::new(), "/ipfs/bafy"));

        assert!(body.next().await.unwrap().is_ok());
        assert!(body.next().await.unwrap().is_err());
        assert!(body.next().await.is_none());
        assert_eq!(body.outcome(), Some(BodyOutcome::Failed));
    }

    #[test]
    fn test_pending_read_wakes_on_cancel() {
        let cancel = CancellationToken::new();
        let upstream: ByteStream = stream::pending().boxed();
        let mut body = tokio_test::task::spawn(CancellableBody::new(upstream, cancel.clone(), "/ipfs/bafy"));

        tokio_test::assert_pending!(body.poll_next());
        cancel.cancel();
        assert!(body.is_woken());
        assert!(matches!(body.poll_next(), Poll::Ready(None)));
    }

    #[test]
    fn test_dropping_unfinished_body_cancels_request() {
        let cancel = CancellationToken::new();
        let upstream: ByteStream = stream::pending().boxed();
        let body = CancellableBody::new(upstream, cancel.clone(), "/ipfs/bafy");

        drop(body);
        assert!(cancel.is_cancelled());
    }
}
