//! Retry with exponential backoff
//!
//! Delays come from `backon`'s exponential builder. Only transient errors
//! (throttling, generic-transient) are retried; anything else surfaces
//! immediately with the attempt count attached.

use crate::config::RetryConfig;
use crate::error::{EngineError, EngineResult, ErrorContext};
use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: base_delay.saturating_mul(16),
            jitter: false,
        }
    }

    fn delays(&self) -> ExponentialBackoff {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_factor(2.0)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize);
        if self.jitter {
            builder = builder.with_jitter();
        }
        builder.build()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
///
/// `op` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    context: ErrorContext,
    mut op: F,
) -> EngineResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let mut delays = policy.delays();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let err = match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = %context.operation, target = %context.target, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_transient() {
            return Err(err.with_context(context.with_attempts(attempt)));
        }

        match delays.next() {
            Some(delay) => {
                warn!(
                    operation = %context.operation,
                    target = %context.target,
                    attempt,
                    delay = ?delay,
                    error = %err,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                return Err(EngineError::RetriesExhausted {
                    context: context.with_attempts(attempt),
                    source: Box::new(err),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::CloudApiError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = retry_with_backoff(&policy(5), ErrorContext::new("delete", "cdn/d-1"), |attempt| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(CloudApiError::transient("flaky").into())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_reports_attempts() {
        let err = retry_with_backoff(&policy(3), ErrorContext::new("describe", "compute/i-1"), |_| async {
            Err::<(), _>(CloudApiError::throttled("slow down").into())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, EngineError::RetriesExhausted { .. }));
        assert_eq!(err.attempts(), 3);
        assert!(err.to_string().contains("describe on 'compute/i-1' after 3 attempts"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let err = retry_with_backoff(&policy(5), ErrorContext::new("create", "network"), |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(CloudApiError::fatal("bad request").into()) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.context().unwrap().operation, "create");
        assert_eq!(err.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_grow() {
        let start = tokio::time::Instant::now();
        let _ = retry_with_backoff(&policy(4), ErrorContext::new("op", "t"), |_| async {
            Err::<(), _>(CloudApiError::transient("x").into())
        })
        .await;
        // 100 + 200 + 400 ms between four attempts
        assert_eq!(start.elapsed(), Duration::from_millis(700));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert!(policy.jitter);
    }
}
