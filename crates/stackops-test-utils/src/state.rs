//! Temporary state directories and stack names

use chrono::Utc;
use stackops_engine::EngineConfig;
use stackops_engine::registry::StackStore;
use std::path::Path;
use tempfile::TempDir;

/// Generate a unique stack name for a test.
///
/// Format: `test-{timestamp_ms}-{counter}`, which passes stack name
/// validation and stays unique when tests start simultaneously.
///
/// ```
/// use stackops_test_utils::test_stack_name;
///
/// let stack = test_stack_name();
/// assert!(stack.starts_with("test-"));
/// ```
pub fn test_stack_name() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("test-{ts}-{counter}")
}

/// State directory that is removed when dropped
pub struct TestState {
    dir: TempDir,
}

impl TestState {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp state dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn store(&self) -> StackStore {
        StackStore::at(self.dir.path()).expect("failed to open state store")
    }

    /// Engine config for `stack` rooted in this directory, with fast
    /// retries and plain output
    pub fn config(&self, stack: &str) -> EngineConfig {
        let mut config = EngineConfig::new(stack, "us-east-1");
        config.output.state_dir = Some(self.dir.path().to_path_buf());
        config.output.no_color = true;
        config.retry.base_delay_ms = 1;
        config.retry.max_delay_ms = 10;
        config.retry.jitter = false;
        config
    }
}

impl Default for TestState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackops_common::validate_stack_name;

    #[test]
    fn test_stack_names_are_unique_and_valid() {
        let a = test_stack_name();
        let b = test_stack_name();
        assert_ne!(a, b);
        validate_stack_name(&a).unwrap();
    }

    #[test]
    fn test_config_points_at_temp_dir() {
        let state = TestState::new();
        let config = state.config("web");
        assert_eq!(config.state_dir().unwrap(), state.path());
        config.validate().unwrap();
    }
}
