//! In-process metrics
//!
//! Counters only go up, gauges keep the last value, histograms fold each
//! observation into a fixed-size running summary. Timers are start/end pairs that
//! record their duration into a `<name>.duration_ms` histogram.

use super::InitFlag;
use crate::error::EngineResult;
use serde::Serialize;
use stackops_common::{RunningStats, SampleStats};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Handle returned by [`Metrics::start_timer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Serializable point-in-time view of every metric
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, f64>,
    pub histograms: BTreeMap<String, SampleStats>,
}

#[derive(Default)]
struct MetricsInner {
    counters: HashMap<String, u64>,
    gauges: HashMap<String, f64>,
    histograms: HashMap<String, RunningStats>,
    timers: HashMap<TimerId, (String, Instant)>,
    next_timer: u64,
}

#[derive(Default)]
pub struct Metrics {
    inner: Mutex<MetricsInner>,
    init: InitFlag,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&self) {
        self.init.set();
        debug!("Metrics initialized");
    }

    fn lock(&self) -> MutexGuard<'_, MetricsInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn increment(&self, name: &str) -> EngineResult<u64> {
        self.add(name, 1)
    }

    /// Add `n` to a counter and return the new total
    pub fn add(&self, name: &str, n: u64) -> EngineResult<u64> {
        self.init.check("metrics")?;
        let mut inner = self.lock();
        let counter = inner.counters.entry(name.to_string()).or_default();
        *counter = counter.saturating_add(n);
        Ok(*counter)
    }

    pub fn gauge(&self, name: &str, value: f64) -> EngineResult<()> {
        self.init.check("metrics")?;
        self.lock().gauges.insert(name.to_string(), value);
        Ok(())
    }

    pub fn observe(&self, name: &str, value: f64) -> EngineResult<()> {
        self.init.check("metrics")?;
        self.lock()
            .histograms
            .entry(name.to_string())
            .or_default()
            .record(value);
        Ok(())
    }

    pub fn start_timer(&self, name: &str) -> EngineResult<TimerId> {
        self.init.check("metrics")?;
        let mut inner = self.lock();
        inner.next_timer += 1;
        let id = TimerId(inner.next_timer);
        inner.timers.insert(id, (name.to_string(), Instant::now()));
        Ok(id)
    }

    /// Stop a timer and record its duration.
    ///
    /// Returns `None` for a timer that was already ended.
    pub fn end_timer(&self, id: TimerId) -> EngineResult<Option<Duration>> {
        self.init.check("metrics")?;
        let mut inner = self.lock();
        let Some((name, started)) = inner.timers.remove(&id) else {
            return Ok(None);
        };
        let elapsed = started.elapsed();
        inner
            .histograms
            .entry(format!("{name}.duration_ms"))
            .or_default()
            .record(elapsed.as_secs_f64() * 1000.0);
        Ok(Some(elapsed))
    }

    pub fn counter(&self, name: &str) -> EngineResult<u64> {
        self.init.check("metrics")?;
        Ok(self.lock().counters.get(name).copied().unwrap_or(0))
    }

    pub fn gauge_value(&self, name: &str) -> EngineResult<Option<f64>> {
        self.init.check("metrics")?;
        Ok(self.lock().gauges.get(name).copied())
    }

    /// Summary of a histogram; empty stats if nothing was observed
    pub fn histogram(&self, name: &str) -> EngineResult<SampleStats> {
        self.init.check("metrics")?;
        Ok(self
            .lock()
            .histograms
            .get(name)
            .map(RunningStats::summary)
            .unwrap_or_default())
    }

    pub fn snapshot(&self) -> EngineResult<MetricsSnapshot> {
        self.init.check("metrics")?;
        let inner = self.lock();
        Ok(MetricsSnapshot {
            counters: inner
                .counters
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            gauges: inner.gauges.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            histograms: inner
                .histograms
                .iter()
                .map(|(k, v)| (k.clone(), v.summary()))
                .collect(),
        })
    }
}
