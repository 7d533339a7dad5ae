//! Concurrency and performance substrate
//!
//! - [`pool`]: bounded worker pool with job status tracking
//! - [`cache`]: TTL + LRU cache
//! - [`connection`]: reusable connection handles
//! - [`metrics`]: counters, gauges, histograms and timers
//! - [`progress`]: spinner and progress bar output
//!
//! Every component requires an explicit `initialize()` call. Accessors used
//! before that fail with [`EngineError::NotInitialized`].

pub mod cache;
pub mod connection;
pub mod metrics;
pub mod pool;
pub mod progress;

pub use cache::{CacheStats, TtlCache};
pub use connection::{ConnectionHandle, ConnectionLease, ConnectionPool, ConnectionStats};
pub use metrics::{Metrics, MetricsSnapshot, TimerId};
pub use pool::{BatchJob, BatchReport, JobRecord, JobScope, JobStatus, PoolStats, WorkerPool};
pub use progress::{ProgressBar, ProgressReporter, Spinner};

use crate::error::{EngineError, EngineResult};
use std::sync::atomic::{AtomicBool, Ordering};

/// Tracks whether `initialize()` has run
#[derive(Debug, Default)]
pub(crate) struct InitFlag(AtomicBool);

impl InitFlag {
    pub(crate) fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub(crate) fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn check(&self, component: &'static str) -> EngineResult<()> {
        if self.is_set() {
            Ok(())
        } else {
            Err(EngineError::NotInitialized { component })
        }
    }
}
