//! Operation dispatch
//!
//! One handler per [`OperationKind`], held in a table that is checked for
//! completeness when the dispatcher is built. Requests are validated before
//! any handler runs.

use super::handlers;
use super::report::OperationReport;
use super::request::{MaintenanceRequest, OperationKind};
use crate::engine::Components;
use crate::error::{EngineError, EngineResult, ErrorContext};
use crate::notify::NotificationEvent;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub(crate) type Handler = for<'a> fn(
    &'a Components,
    &'a MaintenanceRequest,
) -> BoxFuture<'a, EngineResult<OperationReport>>;

pub struct Dispatcher {
    handlers: BTreeMap<OperationKind, Handler>,
}

impl Dispatcher {
    pub fn new() -> EngineResult<Self> {
        Self::with_handlers(BTreeMap::from([
            (OperationKind::Fix, handlers::fix as Handler),
            (OperationKind::Cleanup, handlers::cleanup as Handler),
            (OperationKind::Update, handlers::update as Handler),
            (OperationKind::Health, handlers::health as Handler),
            (OperationKind::Backup, handlers::backup as Handler),
            (OperationKind::Restore, handlers::restore as Handler),
            (OperationKind::Validate, handlers::validate as Handler),
            (OperationKind::Optimize, handlers::optimize as Handler),
        ]))
    }

    fn with_handlers(handlers: BTreeMap<OperationKind, Handler>) -> EngineResult<Self> {
        if let Some(missing) = OperationKind::ALL
            .into_iter()
            .find(|op| !handlers.contains_key(op))
        {
            return Err(EngineError::UnknownOperation {
                name: missing.to_string(),
            });
        }
        Ok(Self { handlers })
    }

    /// Validate `request`, run its handler and record metrics.
    ///
    /// Failures carry the operation, target and dry-run flag.
    pub async fn dispatch(
        &self,
        components: &Components,
        request: &MaintenanceRequest,
    ) -> EngineResult<OperationReport> {
        let op = request.operation;
        let context = ErrorContext::new(op.as_str(), request.label()).with_dry_run(request.dry_run);

        if let Err(e) = request.validate() {
            warn!(operation = %op, error = %e, "Rejected maintenance request");
            let err = attach(e, context);
            self.notify(components, request, "rejected", err.to_string());
            return Err(err);
        }
        let handler = self
            .handlers
            .get(&op)
            .ok_or_else(|| EngineError::UnknownOperation {
                name: op.to_string(),
            })?;

        let metric = format!("maintenance.{op}");
        components.metrics.increment(&metric)?;
        let timer = components.metrics.start_timer(&metric)?;
        if request.dry_run {
            info!(operation = %op, target = %request.label(), "[DRY RUN] Dispatching");
        } else {
            info!(operation = %op, target = %request.label(), "Dispatching");
        }

        let result = handler(components, request).await;
        let elapsed = components.metrics.end_timer(timer)?;

        match result {
            Ok(report) => {
                let report = report.finish();
                info!(
                    operation = %op,
                    status = %report.status,
                    elapsed_ms = elapsed.map(|d| d.as_millis() as u64),
                    "{}",
                    report.summary()
                );
                self.notify(components, request, report.status.as_str(), report.summary());
                Ok(report)
            }
            Err(e) => {
                components.metrics.increment(&format!("{metric}.errors"))?;
                let err = attach(e, context);
                warn!(operation = %op, error = %err, suggestion = %err.suggestion(), "Operation failed");
                self.notify(components, request, "failed", err.to_string());
                Err(err)
            }
        }
    }

    fn notify(
        &self,
        components: &Components,
        request: &MaintenanceRequest,
        status: &str,
        detail: String,
    ) {
        if request.notify {
            components.notifier.notify(
                &NotificationEvent::new(request.operation.as_str(), status).with_detail(detail),
            );
        }
    }
}

/// Attach dispatch context, keeping inner context but carrying the dry-run tag
fn attach(err: EngineError, context: ErrorContext) -> EngineError {
    let dry_run = context.dry_run;
    let mut err = err.with_context(context);
    if let Some(ctx) = err.context_mut() {
        ctx.dry_run |= dry_run;
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::CloudApiError;

    #[test]
    fn test_table_covers_every_operation() {
        let dispatcher = Dispatcher::new().unwrap();
        assert_eq!(dispatcher.handlers.len(), OperationKind::ALL.len());
    }

    #[test]
    fn test_incomplete_table_rejected() {
        let table = BTreeMap::from([(OperationKind::Fix, handlers::fix as Handler)]);
        assert!(matches!(
            Dispatcher::with_handlers(table),
            Err(EngineError::UnknownOperation { .. })
        ));
    }

    #[test]
    fn test_attach_tags_existing_context() {
        let inner = EngineError::from(CloudApiError::fatal("boom"))
            .with_context(ErrorContext::new("delete", "compute/i-1"));
        let err = attach(inner, ErrorContext::new("cleanup", "web").with_dry_run(true));
        let ctx = err.context().unwrap();
        assert_eq!(ctx.operation, "delete");
        assert!(err.is_dry_run());
    }
}
