//! TTL cache with strict LRU eviction

use super::InitFlag;
use crate::error::EngineResult;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub size: usize,
    pub capacity: usize,
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Option<Duration>,
    last_accessed: Instant,
    /// Monotonic access stamp; breaks ties between equal instants
    access_seq: u64,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(self.inserted_at) >= ttl)
    }
}

struct CacheInner<V> {
    entries: HashMap<String, Entry<V>>,
    next_seq: u64,
    stats: CacheStats,
}

impl<V> CacheInner<V> {
    fn stamp(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        let purged = before - self.entries.len();
        self.stats.expirations += purged as u64;
        purged
    }
}

/// Item-count bounded cache
///
/// Entries expire after their TTL. When an insert pushes the cache over
/// capacity, expired entries go first, then the least recently accessed
/// entry other than the one just inserted.
pub struct TtlCache<V> {
    capacity: usize,
    default_ttl: Option<Duration>,
    inner: Mutex<CacheInner<V>>,
    init: InitFlag,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(capacity: usize, default_ttl: Option<Duration>) -> Self {
        Self {
            capacity,
            default_ttl,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                next_seq: 0,
                stats: CacheStats::default(),
            }),
            init: InitFlag::default(),
        }
    }

    pub fn initialize(&self) {
        self.init.set();
        debug!(capacity = self.capacity, "Cache initialized");
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner<V>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or replace `key`. `ttl` overrides the default TTL.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) -> EngineResult<()> {
        self.init.check("cache")?;
        let key = key.into();
        let now = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;
        let access_seq = inner.stamp();
        inner.entries.insert(
            key.clone(),
            Entry {
                value,
                inserted_at: now,
                ttl: ttl.or(self.default_ttl),
                last_accessed: now,
                access_seq,
            },
        );

        if inner.entries.len() > self.capacity {
            inner.purge_expired(now);
        }
        while inner.entries.len() > self.capacity {
            let victim = inner
                .entries
                .iter()
                .filter(|(k, _)| **k != key)
                .min_by_key(|(_, e)| (e.last_accessed, e.access_seq))
                .map(|(k, _)| k.clone());
            let Some(victim) = victim else { break };
            inner.entries.remove(&victim);
            inner.stats.evictions += 1;
            debug!(key = %victim, "Evicted least recently used entry");
        }
        Ok(())
    }

    /// Hit refreshes the entry's access time; expired entries count as misses.
    pub fn get(&self, key: &str) -> EngineResult<Option<V>> {
        self.init.check("cache")?;
        let now = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;
        let access_seq = inner.stamp();

        let expired = match inner.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.last_accessed = now;
                entry.access_seq = access_seq;
                let value = entry.value.clone();
                inner.stats.hits += 1;
                return Ok(Some(value));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.remove(key);
            inner.stats.expirations += 1;
        }
        inner.stats.misses += 1;
        Ok(None)
    }

    pub fn remove(&self, key: &str) -> EngineResult<bool> {
        self.init.check("cache")?;
        Ok(self.lock().entries.remove(key).is_some())
    }

    /// Drop every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> EngineResult<usize> {
        self.init.check("cache")?;
        let purged = self.lock().purge_expired(Instant::now());
        if purged > 0 {
            debug!(purged, "Purged expired cache entries");
        }
        Ok(purged)
    }

    pub fn len(&self) -> EngineResult<usize> {
        self.init.check("cache")?;
        Ok(self.lock().entries.len())
    }

    pub fn is_empty(&self) -> EngineResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn stats(&self) -> EngineResult<CacheStats> {
        self.init.check("cache")?;
        let inner = self.lock();
        Ok(CacheStats {
            size: inner.entries.len(),
            capacity: self.capacity,
            ..inner.stats
        })
    }
}
