//! Maintenance operations
//!
//! A [`MaintenanceRequest`] names one [`OperationKind`] plus its parameters.
//! The [`Dispatcher`] validates it, runs the matching handler against the
//! engine's components and returns an [`OperationReport`].

mod dispatcher;
mod handlers;
mod report;
mod request;

pub use dispatcher::Dispatcher;
pub use report::{OperationReport, OperationStatus};
pub use request::{MaintenanceRequest, OperationKind, Scope, ValidationType};
