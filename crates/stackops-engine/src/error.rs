//! Engine error taxonomy
//!
//! Every error that crosses a component boundary is an [`EngineError`].
//! I/O plumbing inside a component uses `anyhow` and is converted at the
//! boundary (see `registry`).

use crate::cloud::CloudApiError;
use stackops_common::{InputError, ResourceKind};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Operation, target and attempt count attached to a surfaced failure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub operation: String,
    pub target: String,
    pub attempts: u32,
    pub dry_run: bool,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            target: target.into(),
            attempts: 1,
            dry_run: false,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            f.write_str("[DRY RUN] ")?;
        }
        write!(f, "{} on '{}'", self.operation, self.target)?;
        if self.attempts > 1 {
            write!(f, " after {} attempts", self.attempts)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected parameter combination, raised before any side effect
    #[error("Invalid parameters for {operation}: {reason}")]
    Validation { operation: String, reason: String },

    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    /// Durable registry read or write failed
    #[error("Registry error for stack '{stack}': {reason}")]
    Registry { stack: String, reason: String },

    #[error("Cannot delete {kind} '{id}': still referenced by {}", dependents.join(", "))]
    DependencyConflict {
        kind: ResourceKind,
        id: String,
        dependents: Vec<String>,
    },

    #[error("Circuit open for '{service}'")]
    CircuitOpen { service: String },

    #[error("Job '{job_id}' timed out after {timeout:?}")]
    Timeout { job_id: String, timeout: Duration },

    #[error(transparent)]
    Cloud(#[from] CloudApiError),

    #[error("{component} used before initialize()")]
    NotInitialized { component: &'static str },

    #[error("Circular dependency: {}", cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("Unknown module or group '{name}'")]
    UnknownModule { name: String },

    #[error("Unknown operation '{name}'")]
    UnknownOperation { name: String },

    #[error("Unknown job '{job_id}'")]
    UnknownJob { job_id: String },

    #[error("Job '{job_id}' already submitted")]
    DuplicateJob { job_id: String },

    #[error("Connection pool exhausted ({max_total} connections open)")]
    PoolExhausted { max_total: usize },

    /// Released handle was not leased from this pool, or was already released
    #[error("Connection {id} is not leased from this pool")]
    UnknownConnection { id: u64 },

    #[error("No cached entry for '{key}'")]
    CacheMiss { key: String },

    #[error("{context}: {source}")]
    Context {
        context: ErrorContext,
        #[source]
        source: Box<EngineError>,
    },

    #[error("{context}: retries exhausted: {source}")]
    RetriesExhausted {
        context: ErrorContext,
        #[source]
        source: Box<EngineError>,
    },

    #[error("{operation}: primary failed ({primary}), fallback failed ({secondary})")]
    FallbackExhausted {
        operation: String,
        primary: Box<EngineError>,
        secondary: Box<EngineError>,
    },
}

impl EngineError {
    pub fn validation(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Validation {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Wrap with operation context unless context is already attached.
    pub fn with_context(self, context: ErrorContext) -> Self {
        match self {
            EngineError::Context { .. } | EngineError::RetriesExhausted { .. } => self,
            other => EngineError::Context {
                context,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping context wrappers
    pub fn root(&self) -> &EngineError {
        match self {
            EngineError::Context { source, .. } | EngineError::RetriesExhausted { source, .. } => {
                source.root()
            }
            other => other,
        }
    }

    /// Context attached on the way up, if any
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            EngineError::Context { context, .. } | EngineError::RetriesExhausted { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    pub fn context_mut(&mut self) -> Option<&mut ErrorContext> {
        match self {
            EngineError::Context { context, .. } | EngineError::RetriesExhausted { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    /// Number of attempts made before this error surfaced
    pub fn attempts(&self) -> u32 {
        self.context().map(|c| c.attempts).unwrap_or(1)
    }

    pub fn is_dry_run(&self) -> bool {
        self.context().is_some_and(|c| c.dry_run)
    }

    /// Check if retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self.root() {
            EngineError::Cloud(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), EngineError::Cloud(e) if e.is_not_found())
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> String {
        let s = match self.root() {
            EngineError::Validation { .. } | EngineError::Input(_) => {
                "Check the required parameters for this operation."
            }
            EngineError::Registry { .. } => {
                "Check that the state directory exists and is writable."
            }
            EngineError::DependencyConflict { .. } => {
                "Delete the dependent resources first, or rerun with force."
            }
            EngineError::CircuitOpen { .. } => {
                "The service is failing repeatedly. Wait for the cool-down before retrying."
            }
            EngineError::Timeout { .. } => "Increase the job timeout or reduce the batch size.",
            EngineError::Cloud(e) => {
                return e
                    .suggestion()
                    .unwrap_or_else(|| "Inspect the provider error and retry.".to_string());
            }
            EngineError::NotInitialized { .. } => "Start the engine before using its components.",
            EngineError::CircularDependency { .. } | EngineError::UnknownModule { .. } => {
                "Fix the module declarations."
            }
            EngineError::UnknownOperation { .. } => {
                "Use one of: fix, cleanup, update, health, backup, restore, validate, optimize."
            }
            EngineError::UnknownJob { .. } | EngineError::DuplicateJob { .. } => {
                "Use a unique job id per submission."
            }
            EngineError::PoolExhausted { .. } => "Release connections or raise the connection limit.",
            EngineError::UnknownConnection { .. } => {
                "Release each connection exactly once, to the pool it came from."
            }
            EngineError::CacheMiss { .. } => {
                "Run a health check while the provider is reachable to record its state."
            }
            EngineError::FallbackExhausted { .. } => {
                "Both the primary and fallback paths failed. Check provider health."
            }
            EngineError::Context { .. } | EngineError::RetriesExhausted { .. } => {
                "Retry the operation."
            }
        };
        s.to_string()
    }
}
