//! stackops engine
//!
//! Provisions, tracks, heals and tears down the cloud resources of a named
//! stack. The cloud provider itself is an injected [`CloudApi`].
//!
//! Modules:
//! - [`registry`]: durable per-stack resource ledger
//! - [`loader`]: dependency-ordered module loading
//! - [`cleanup`]: dependency-ordered teardown
//! - [`perf`]: worker pool, cache, connections, metrics, progress
//! - [`resilience`]: retry, circuit breakers, fallback
//! - [`maintenance`]: operation dispatcher and handlers
//! - [`engine`]: wires one instance of everything per stack

pub mod cleanup;
pub mod cloud;
pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod logging;
pub mod maintenance;
pub mod notify;
pub mod perf;
pub mod registry;
pub mod resilience;

pub use cleanup::{CleanupMode, CleanupOrchestrator};
pub use cloud::{CloudApi, CloudApiError, CloudErrorKind};
pub use config::EngineConfig;
pub use engine::{Components, Engine, EngineBuilder};
pub use error::{EngineError, EngineResult, ErrorContext};
pub use maintenance::{
    MaintenanceRequest, OperationKind, OperationReport, OperationStatus, Scope, ValidationType,
};
pub use registry::{Resource, ResourceRegistry};
