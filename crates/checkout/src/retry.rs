//! Re-running decisions that lost an optimistic-concurrency race.

use std::future::Future;

use crate::error::{CheckoutError, Result};

/// Runs `attempt` until it succeeds, fails with something other than a
/// concurrency conflict, or `max_attempts` conflicts have happened.
///
/// Each attempt must re-read everything it decides on; a conflict means
/// nothing of that attempt was written.
pub async fn with_retry<T, F, Fut>(
    operation: &'static str,
    max_attempts: u32,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        match attempt().await {
            Err(e) if e.is_conflict() => {
                metrics::counter!("checkout_commit_conflicts_total", "operation" => operation)
                    .increment(1);

                if attempts >= max_attempts {
                    tracing::warn!(operation, attempts, "giving up after repeated conflicts");
                    return Err(CheckoutError::Contention {
                        operation,
                        attempts,
                    });
                }

                tracing::debug!(operation, attempts, error = %e, "commit conflict, retrying");
                tokio::task::yield_now().await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use common::AggregateId;
    use event_store::{EventStoreError, Version};

    use super::*;

    fn conflict() -> CheckoutError {
        CheckoutError::EventStore(EventStoreError::ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            expected: Version::new(1),
            actual: Version::new(2),
        })
    }

    #[tokio::test]
    async fn retries_conflicts_until_success() {
        let calls = AtomicU32::new(0);

        let result = with_retry("test", 5, || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(conflict())
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry("test", 5, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CheckoutError::EmptyCart)
        })
        .await;

        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_reports_contention() {
        let result: Result<()> = with_retry("place_order", 3, || async { Err(conflict()) }).await;

        assert!(matches!(
            result,
            Err(CheckoutError::Contention {
                operation: "place_order",
                attempts: 3
            })
        ));
    }
}
