//! Default configuration values shared across stackops components
//!
//! These constants keep the engine config, the test helpers and the serde
//! defaults of persisted records in agreement.

/// Default maximum number of concurrently running jobs
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default per-job wait timeout in seconds
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 300;

/// Finished job records kept before the oldest are pruned
pub const DEFAULT_FINISHED_JOB_RETENTION: usize = 1024;

/// Default cache capacity (item count)
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Default cache entry time-to-live in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default number of idle connections kept per pool
pub const DEFAULT_MAX_IDLE_CONNECTIONS: usize = 8;

/// Default hard cap on open connections
pub const DEFAULT_MAX_TOTAL_CONNECTIONS: usize = 32;

/// Default number of attempts for retried cloud calls
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default base delay between retries in milliseconds
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// Default cap on the delay between retries in milliseconds
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;

/// Consecutive failures before a circuit opens
pub const DEFAULT_BREAKER_THRESHOLD: u32 = 5;

/// Seconds an open circuit waits before allowing a trial call
pub const DEFAULT_BREAKER_COOLDOWN_SECS: u64 = 30;

/// Default deployment environment
pub const DEFAULT_ENVIRONMENT: &str = "dev";

/// Default cloud region
pub const DEFAULT_REGION: &str = "us-east-1";

// Serde default functions for struct field defaults

/// Returns the default environment name
pub fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

/// Returns the default region
pub fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

