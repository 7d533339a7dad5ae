//! Reusable connection handles keyed by service and region
//!
//! Handles are logical sessions against the cloud collaborator. Released
//! handles go back to an idle set and are preferred over opening new ones.

use super::InitFlag;
use crate::error::{EngineError, EngineResult};
use serde::Serialize;
use std::collections::HashSet;
use std::ops::Deref;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// One open connection. Not `Clone`: a handle is owned by one caller at a time.
#[derive(Debug, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub id: u64,
    pub service: String,
    pub region: String,
    pub created_at: Instant,
    pub last_used: Instant,
}

impl ConnectionHandle {
    fn matches(&self, service: &str, region: &str) -> bool {
        self.service == service && self.region == region
    }
}

/// Pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    pub created: u64,
    pub reused: u64,
    pub released: u64,
    pub closed: u64,
    pub idle: usize,
    pub open: usize,
}

struct PoolInner {
    idle: Vec<ConnectionHandle>,
    /// Ids currently handed out
    leased: HashSet<u64>,
    /// Open connections, idle and in use
    open: usize,
    next_id: u64,
    stats: ConnectionStats,
}

/// Pool enforcing max idle and max total connections
pub struct ConnectionPool {
    max_idle: usize,
    max_total: usize,
    inner: Mutex<PoolInner>,
    init: InitFlag,
}

impl ConnectionPool {
    pub fn new(max_idle: usize, max_total: usize) -> Self {
        Self {
            max_idle,
            max_total,
            inner: Mutex::new(PoolInner {
                idle: Vec::new(),
                leased: HashSet::new(),
                open: 0,
                next_id: 0,
                stats: ConnectionStats::default(),
            }),
            init: InitFlag::default(),
        }
    }

    pub fn initialize(&self) {
        self.init.set();
        debug!(
            max_idle = self.max_idle,
            max_total = self.max_total,
            "Connection pool initialized"
        );
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reuse an idle matching connection or open a new one.
    ///
    /// At the total limit, the oldest idle connection for another key is
    /// closed to make room; with nothing idle the pool is exhausted.
    pub fn get_connection(&self, service: &str, region: &str) -> EngineResult<ConnectionHandle> {
        self.init.check("connection pool")?;
        let now = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;

        if let Some(pos) = inner.idle.iter().position(|h| h.matches(service, region)) {
            let mut handle = inner.idle.swap_remove(pos);
            handle.last_used = now;
            inner.stats.reused += 1;
            inner.leased.insert(handle.id);
            debug!(id = handle.id, service = %service, region = %region, "Reused connection");
            return Ok(handle);
        }

        if inner.open >= self.max_total {
            let oldest = inner
                .idle
                .iter()
                .enumerate()
                .min_by_key(|(_, h)| h.last_used)
                .map(|(pos, _)| pos);
            match oldest {
                Some(pos) => {
                    let closed = inner.idle.swap_remove(pos);
                    inner.open = inner.open.saturating_sub(1);
                    inner.stats.closed += 1;
                    debug!(id = closed.id, service = %closed.service, "Closed idle connection to make room");
                }
                None => {
                    return Err(EngineError::PoolExhausted {
                        max_total: self.max_total,
                    });
                }
            }
        }

        inner.next_id += 1;
        inner.open += 1;
        inner.leased.insert(inner.next_id);
        inner.stats.created += 1;
        let handle = ConnectionHandle {
            id: inner.next_id,
            service: service.to_string(),
            region: region.to_string(),
            created_at: now,
            last_used: now,
        };
        debug!(id = handle.id, service = %service, region = %region, "Opened connection");
        Ok(handle)
    }

    /// Return a handle to the idle set, or close it if the idle set is full.
    ///
    /// Fails for a handle this pool does not currently have leased out.
    pub fn release_connection(&self, mut handle: ConnectionHandle) -> EngineResult<()> {
        self.init.check("connection pool")?;
        let mut inner = self.lock();
        if !inner.leased.remove(&handle.id) {
            return Err(EngineError::UnknownConnection { id: handle.id });
        }
        if inner.idle.len() >= self.max_idle {
            inner.open = inner.open.saturating_sub(1);
            inner.stats.closed += 1;
            return Ok(());
        }
        handle.last_used = Instant::now();
        inner.idle.push(handle);
        inner.stats.released += 1;
        Ok(())
    }

    /// Borrow a connection for the lifetime of the returned lease
    pub fn lease(&self, service: &str, region: &str) -> EngineResult<ConnectionLease<'_>> {
        let handle = self.get_connection(service, region)?;
        Ok(ConnectionLease {
            pool: self,
            handle: Some(handle),
        })
    }

    /// Close idle connections unused for at least `max_age`
    pub fn trim_idle(&self, max_age: Duration) -> EngineResult<usize> {
        self.init.check("connection pool")?;
        let now = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;
        let before = inner.idle.len();
        inner
            .idle
            .retain(|h| now.saturating_duration_since(h.last_used) < max_age);
        let trimmed = before - inner.idle.len();
        inner.open = inner.open.saturating_sub(trimmed);
        inner.stats.closed += trimmed as u64;
        Ok(trimmed)
    }

    pub fn stats(&self) -> EngineResult<ConnectionStats> {
        self.init.check("connection pool")?;
        let inner = self.lock();
        Ok(ConnectionStats {
            idle: inner.idle.len(),
            open: inner.open,
            ..inner.stats
        })
    }
}

/// Scoped connection; released back to the pool on drop
pub struct ConnectionLease<'a> {
    pool: &'a ConnectionPool,
    handle: Option<ConnectionHandle>,
}

impl Deref for ConnectionLease<'_> {
    type Target = ConnectionHandle;

    fn deref(&self) -> &Self::Target {
        // Only taken in drop
        self.handle.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for ConnectionLease<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.pool.release_connection(handle);
        }
    }
}
