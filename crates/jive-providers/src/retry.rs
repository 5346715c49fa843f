//! Storage retry policy
//!
//! Availability failures retry with exponential backoff (1 s → 2 s → 4 s,
//! three retries); every other error category surfaces immediately.

use std::future::Future;
use std::time::Duration;

use jive_domain::error::Result;

/// Retry configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles each attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy with no delay, for tests.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Run `op`, retrying retryable errors per the policy.
///
/// # Errors
///
/// Returns the final error once retries are exhausted, or the first
/// non-retryable error immediately.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying storage operation"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jive_domain::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn retries_unavailable_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retry(RetryPolicy::immediate(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::storage_unavailable("connection refused"))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_fails_fast() {
        let calls = AtomicU32::new(0);
        let err = with_retry(RetryPolicy::immediate(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Error::validation("bad input")) }
        })
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_last_error() {
        let err = with_retry(RetryPolicy::immediate(), || async {
            Err::<(), _>(Error::storage_unavailable("still down"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), "STORAGE_UNAVAILABLE");
    }
}
