//! Cancellation and timeout helpers
//!
//! Every suspension point takes the request's [`CancellationToken`] and
//! races it against its own completion. The losing future is dropped, not
//! driven to completion.

use crate::{GatewayError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run `fut` unless `cancel` fires first
pub async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GatewayError::Cancelled),
        result = fut => result,
    }
}

/// Run `op` with a child token that is cancelled when `timeout` elapses
///
/// Whichever of parent cancellation, the timer or the operation finishes
/// first decides the outcome.
pub async fn with_timeout<F, Fut, T>(
    cancel: &CancellationToken,
    timeout: Duration,
    op: F,
) -> Result<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let child = cancel.child_token();
    let fut = op(child.clone());

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GatewayError::Cancelled),
        _ = tokio::time::sleep(timeout) => Err(GatewayError::Timeout {
            millis: timeout.as_millis() as u64,
        }),
        result = fut => result,
    };

    child.cancel();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancellable_passes_through() {
        let cancel = CancellationToken::new();
        let value = cancellable(&cancel, async { Ok(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_cancellable_observes_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<()> = cancellable(&cancel, std::future::pending()).await;
        assert!(matches!(result, Err(GatewayError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let cancel = CancellationToken::new();
        let result: Result<()> = with_timeout(&cancel, Duration::from_secs(20), |child| async move {
            child.cancelled().await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(GatewayError::Timeout { millis: 20_000 })));
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_completes_first() {
        let cancel = CancellationToken::new();
        let result = with_timeout(&cancel, Duration::from_secs(1), |_| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok("done")
        })
        .await;

        assert_eq!(result.unwrap(), "done");
    }
}
