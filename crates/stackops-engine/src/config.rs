//! Configuration types for the engine
//!
//! The engine never reads config files itself. The configuration
//! collaborator resolves an [`EngineConfig`] (typically by deserializing it)
//! and hands it to [`EngineBuilder::start`](crate::EngineBuilder::start).

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use stackops_common::defaults::*;
use stackops_common::{validate_region, validate_stack_name};
use std::path::PathBuf;
use std::time::Duration;

/// Which stack this engine instance manages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    pub name: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Worker pool sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub max_workers: usize,
    /// Seconds `wait` blocks when no timeout is given
    pub job_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            job_timeout_secs: DEFAULT_JOB_TIMEOUT_SECS,
        }
    }
}

/// Describe-result cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

/// Connection pool limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub max_idle: usize,
    pub max_total: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_idle: DEFAULT_MAX_IDLE_CONNECTIONS,
            max_total: DEFAULT_MAX_TOTAL_CONNECTIONS,
        }
    }
}

/// Retry-with-backoff settings for cloud calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            jitter: true,
        }
    }
}

/// Circuit breaker settings, applied per service key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_BREAKER_THRESHOLD,
            cooldown_secs: DEFAULT_BREAKER_COOLDOWN_SECS,
        }
    }
}

/// Output behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Plain progress output without escape codes
    pub no_color: bool,
    /// Override for the state directory (defaults to the user data dir)
    pub state_dir: Option<PathBuf>,
}

/// Resolved engine configuration
///
/// Composed of focused sub-configs. Flat accessors cover the values most
/// call sites need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub stack: StackConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub connections: ConnectionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl EngineConfig {
    /// Defaults for everything but the stack identity
    pub fn new(stack: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            stack: StackConfig {
                name: stack.into(),
                region: region.into(),
                environment: default_environment(),
            },
            workers: WorkerConfig::default(),
            cache: CacheConfig::default(),
            connections: ConnectionConfig::default(),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Check the record is usable before any component is built
    pub fn validate(&self) -> EngineResult<()> {
        validate_stack_name(&self.stack.name)?;
        validate_region(&self.stack.region)?;

        let invalid = |reason: &str| Err(EngineError::validation("config", reason));
        if self.workers.max_workers == 0 {
            return invalid("workers.max_workers must be at least 1");
        }
        if self.cache.capacity == 0 {
            return invalid("cache.capacity must be at least 1");
        }
        if self.connections.max_total == 0 {
            return invalid("connections.max_total must be at least 1");
        }
        if self.connections.max_idle > self.connections.max_total {
            return invalid("connections.max_idle must not exceed connections.max_total");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return invalid("retry.base_delay_ms must not exceed retry.max_delay_ms");
        }
        if self.breaker.threshold == 0 {
            return invalid("breaker.threshold must be at least 1");
        }
        Ok(())
    }

    pub fn stack_name(&self) -> &str {
        &self.stack.name
    }
    pub fn region(&self) -> &str {
        &self.stack.region
    }
    pub fn environment(&self) -> &str {
        &self.stack.environment
    }
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.workers.job_timeout_secs)
    }
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker.cooldown_secs)
    }
    pub fn no_color(&self) -> bool {
        self.output.no_color
    }
    pub fn state_dir(&self) -> Option<&PathBuf> {
        self.output.state_dir.as_ref()
    }
}
