//! Resilience engine
//!
//! - [`retry`]: retry-with-backoff for transient failures
//! - [`breaker`]: per-service circuit breakers
//! - [`fallback`]: primary / secondary chains
//!
//! [`Resilience::call`] composes the first two: every retry attempt goes
//! through the breaker for its service key, so an opened circuit stops the
//! retry loop immediately.

pub mod breaker;
pub mod fallback;
pub mod retry;

pub use breaker::{CircuitBreakers, CircuitState, CircuitStatus};
pub use fallback::{FallbackOutcome, FallbackSource, with_fallback};
pub use retry::{RetryPolicy, retry_with_backoff};

use crate::config::EngineConfig;
use crate::error::{EngineResult, ErrorContext};
use std::future::Future;

pub struct Resilience {
    retry: RetryPolicy,
    breakers: CircuitBreakers,
}

impl Resilience {
    pub fn new(retry: RetryPolicy, breakers: CircuitBreakers) -> Self {
        Self { retry, breakers }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            RetryPolicy::from(&config.retry),
            CircuitBreakers::new(config.breaker.threshold, config.breaker_cooldown()),
        )
    }

    /// Retry `op` with backoff, each attempt guarded by the breaker for
    /// `service`. Failures carry `context` with the attempt count.
    pub async fn call<T, F, Fut>(&self, context: ErrorContext, service: &str, op: F) -> EngineResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        retry_with_backoff(&self.retry, context, |_| self.breakers.call(service, &op)).await
    }

    pub fn breakers(&self) -> &CircuitBreakers {
        &self.breakers
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::CloudApiError;
    use crate::error::EngineError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn resilience(attempts: u32, threshold: u32) -> Resilience {
        Resilience::new(
            RetryPolicy::new(attempts, Duration::from_millis(10)),
            CircuitBreakers::new(threshold, Duration::from_secs(60)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_through_breaker() {
        let resilience = resilience(5, 10);
        let calls = AtomicU32::new(0);

        let value = resilience
            .call(ErrorContext::new("delete", "compute/i-1"), "cloud:compute", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(CloudApiError::transient("flaky").into())
                } else {
                    Ok(n)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(resilience.breakers().failure_count("cloud:compute"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_stops_retrying() {
        let resilience = resilience(5, 2);
        let calls = AtomicU32::new(0);

        let err = resilience
            .call(ErrorContext::new("delete", "cdn/d-1"), "cloud:cdn", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(CloudApiError::throttled("slow").into())
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(err.root(), EngineError::CircuitOpen { .. }));
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.context().unwrap().target, "cdn/d-1");
    }
}
