//! Dependency-ordered teardown
//!
//! - [`plan`]: cleanup modes and the ordered plan
//! - [`confirm`]: confirmation collaborator for manual mode
//! - [`orchestrator`]: executes plans against the registry and cloud

pub mod confirm;
pub mod orchestrator;
pub mod plan;

pub use confirm::{AlwaysConfirm, Confirm, NeverConfirm};
pub use orchestrator::{
    CleanupCounts, CleanupOptions, CleanupOrchestrator, CleanupReport, DeletionOutcome,
    ResourceOutcome,
};
pub use plan::{CleanupMode, CleanupPlan, CleanupStep};
