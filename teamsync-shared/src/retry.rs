/// Whole-operation retry on serialization failure
///
/// A failed serializable transaction has already rolled back, so the only
/// correct retry is to run the entire unit of work again from the first
/// read. Operations pass a closure that opens its own transaction.

use std::future::Future;

use crate::error::CoreResult;

/// Runs `op` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` attempts have been made
pub async fn with_retries<T, F, Fut>(max_attempts: u32, operation: &'static str, mut op: F) -> CoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                tracing::debug!(operation, attempt, "Serialization conflict, retrying");
                attempt += 1;
            }
            Err(err) if err.is_retryable() => {
                tracing::warn!(operation, attempt, "Giving up after repeated serialization conflicts");
                return Err(err);
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::store::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_serialization_failures() {
        let calls = &AtomicU32::new(0);
        let result = with_retries(3, "test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(CoreError::Store(StoreError::Serialization))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: CoreResult<()> = with_retries(2, "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::Store(StoreError::Serialization))
        })
        .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_domain_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: CoreResult<()> = with_retries(5, "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::Conflict("taken".to_string()))
        })
        .await;

        assert!(matches!(result, Err(CoreError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
