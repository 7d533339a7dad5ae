//! Per-service circuit breakers
//!
//! Consecutive failures on a key open its circuit. While open, calls fail
//! with [`EngineError::CircuitOpen`] without running. After the cool-down a
//! single trial call is let through: success closes the circuit, failure
//! opens it again for another cool-down.

use crate::error::{EngineError, EngineResult};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        })
    }
}

#[derive(Debug, Default)]
struct Circuit {
    state: CircuitState,
    failure_count: u32,
    /// When the circuit opened or the last trial started
    since: Option<Instant>,
}

/// Read-only view of one circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CircuitStatus {
    pub state: CircuitState,
    pub failure_count: u32,
}

pub struct CircuitBreakers {
    threshold: u32,
    cooldown: Duration,
    circuits: Mutex<HashMap<String, Circuit>>,
}

/// Whether a call may proceed, and whether it is the half-open trial
enum Admission {
    Normal,
    Trial,
}

impl CircuitBreakers {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            circuits: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        self.circuits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `op` through the breaker for `key`.
    ///
    /// Not-found errors are answers, not service failures, and leave the
    /// failure count untouched.
    pub async fn call<T, F, Fut>(&self, key: &str, op: F) -> EngineResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        let admission = self.admit(key)?;
        let result = op().await;
        match &result {
            Ok(_) => self.on_success(key),
            Err(e) if e.is_not_found() => self.on_success(key),
            Err(_) => self.on_failure(key, admission),
        }
        result
    }

    fn admit(&self, key: &str) -> EngineResult<Admission> {
        let mut circuits = self.lock();
        let circuit = circuits.entry(key.to_string()).or_default();
        if circuit.state == CircuitState::Closed {
            return Ok(Admission::Normal);
        }
        // Half-open with a trial in flight waits too; an abandoned trial
        // gets replaced after another cool-down
        let cooled = circuit
            .since
            .is_some_and(|at| at.elapsed() >= self.cooldown);
        if !cooled {
            return Err(EngineError::CircuitOpen {
                service: key.to_string(),
            });
        }
        circuit.state = CircuitState::HalfOpen;
        circuit.since = Some(Instant::now());
        info!(service = %key, "Circuit half-open, allowing trial call");
        Ok(Admission::Trial)
    }

    fn on_success(&self, key: &str) {
        let mut circuits = self.lock();
        let circuit = circuits.entry(key.to_string()).or_default();
        if circuit.state != CircuitState::Closed {
            info!(service = %key, "Circuit closed");
        }
        *circuit = Circuit::default();
    }

    fn on_failure(&self, key: &str, admission: Admission) {
        let mut circuits = self.lock();
        let circuit = circuits.entry(key.to_string()).or_default();
        circuit.failure_count = circuit.failure_count.saturating_add(1);

        let trip = matches!(admission, Admission::Trial) || circuit.failure_count >= self.threshold;
        if trip && circuit.state != CircuitState::Open {
            warn!(
                service = %key,
                failures = circuit.failure_count,
                cooldown = ?self.cooldown,
                "Circuit opened"
            );
        }
        if trip {
            circuit.state = CircuitState::Open;
            circuit.since = Some(Instant::now());
        }
    }

    pub fn state(&self, key: &str) -> CircuitState {
        self.lock().get(key).map(|c| c.state).unwrap_or_default()
    }

    pub fn failure_count(&self, key: &str) -> u32 {
        self.lock().get(key).map(|c| c.failure_count).unwrap_or(0)
    }

    /// Force a circuit closed
    pub fn reset(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn snapshot(&self) -> BTreeMap<String, CircuitStatus> {
        self.lock()
            .iter()
            .map(|(key, c)| {
                (
                    key.clone(),
                    CircuitStatus {
                        state: c.state,
                        failure_count: c.failure_count,
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::CloudApiError;
    use std::sync::atomic::{AtomicU32, Ordering};

    const KEY: &str = "cloud:compute";

    async fn fail(breakers: &CircuitBreakers, calls: &AtomicU32) -> EngineResult<()> {
        breakers
            .call(KEY, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CloudApiError::fatal("down").into())
            })
            .await
    }

    async fn succeed(breakers: &CircuitBreakers, calls: &AtomicU32) -> EngineResult<()> {
        breakers
            .call(KEY, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_and_short_circuits() {
        let breakers = CircuitBreakers::new(3, Duration::from_secs(30));
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            assert!(fail(&breakers, &calls).await.is_err());
        }
        assert_eq!(breakers.state(KEY), CircuitState::Open);

        let err = succeed(&breakers, &calls).await.unwrap_err();
        assert!(matches!(err, EngineError::CircuitOpen { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "4th call must not run");
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let breakers = CircuitBreakers::new(3, Duration::from_secs(30));
        let calls = AtomicU32::new(0);

        fail(&breakers, &calls).await.unwrap_err();
        fail(&breakers, &calls).await.unwrap_err();
        assert_eq!(breakers.failure_count(KEY), 2);

        succeed(&breakers, &calls).await.unwrap();
        assert_eq!(breakers.failure_count(KEY), 0);
        assert_eq!(breakers.state(KEY), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_trial_after_cooldown() {
        let breakers = CircuitBreakers::new(3, Duration::from_secs(30));
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            fail(&breakers, &calls).await.unwrap_err();
        }

        tokio::time::sleep(Duration::from_secs(31)).await;
        succeed(&breakers, &calls).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(breakers.state(KEY), CircuitState::Closed);
        assert_eq!(breakers.failure_count(KEY), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trial_reopens() {
        let breakers = CircuitBreakers::new(2, Duration::from_secs(10));
        let calls = AtomicU32::new(0);
        fail(&breakers, &calls).await.unwrap_err();
        fail(&breakers, &calls).await.unwrap_err();

        tokio::time::sleep(Duration::from_secs(11)).await;
        fail(&breakers, &calls).await.unwrap_err();
        assert_eq!(breakers.state(KEY), CircuitState::Open);

        // Cool-down restarted from the failed trial
        let err = succeed(&breakers, &calls).await.unwrap_err();
        assert!(matches!(err, EngineError::CircuitOpen { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_does_not_count() {
        let breakers = CircuitBreakers::new(1, Duration::from_secs(10));
        let result: EngineResult<()> = breakers
            .call(KEY, || async { Err(CloudApiError::not_found("gone").into()) })
            .await;
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(breakers.state(KEY), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let breakers = CircuitBreakers::new(1, Duration::from_secs(10));
        let calls = AtomicU32::new(0);
        fail(&breakers, &calls).await.unwrap_err();

        assert_eq!(breakers.state(KEY), CircuitState::Open);
        assert_eq!(breakers.state("cloud:cdn"), CircuitState::Closed);
        let snapshot = breakers.snapshot();
        assert_eq!(snapshot[KEY].state, CircuitState::Open);

        breakers.reset(KEY);
        assert_eq!(breakers.state(KEY), CircuitState::Closed);
    }
}
