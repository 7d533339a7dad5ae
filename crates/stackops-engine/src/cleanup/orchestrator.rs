//! Cleanup execution
//!
//! Kinds are torn down one at a time in [`ResourceKind::CLEANUP_ORDER`];
//! instances of one kind are deleted concurrently. Each deletion is gated on
//! the per-instance dependency check, flagged pending in the registry before
//! the cloud call, and removed from the registry once the provider confirms.

use super::confirm::Confirm;
use super::plan::{CleanupMode, CleanupPlan, CleanupStep};
use crate::cloud::CloudApi;
use crate::error::{EngineError, EngineResult, ErrorContext};
use crate::perf::ProgressReporter;
use crate::registry::{CleanupRecord, Resource, ResourceRegistry};
use crate::resilience::Resilience;
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use stackops_common::ResourceKind;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a cleanup run behaves
#[derive(Debug, Clone, Default)]
pub struct CleanupOptions {
    pub mode: CleanupMode,
    /// Skip dependency checks and manual confirmation
    pub force: bool,
    /// Restrict the run to one kind
    pub only: Option<ResourceKind>,
}

impl CleanupOptions {
    pub fn new(mode: CleanupMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn only(mut self, kind: ResourceKind) -> Self {
        self.only = Some(kind);
        self
    }
}

/// Result of deleting one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "outcome", content = "reason")]
pub enum DeletionOutcome {
    Deleted,
    /// Provider reported not-found; counted as deleted
    AlreadyDeleted,
    Skipped(String),
    Failed(String),
}

impl DeletionOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeletionOutcome::Deleted | DeletionOutcome::AlreadyDeleted)
    }
}

#[derive(Debug, Clone)]
pub struct ResourceOutcome {
    pub resource: Resource,
    pub outcome: DeletionOutcome,
}

/// Everything a cleanup run did
#[derive(Debug, Clone)]
pub struct CleanupReport {
    pub plan: CleanupPlan,
    pub outcomes: Vec<ResourceOutcome>,
}

impl CleanupReport {
    pub fn mode(&self) -> CleanupMode {
        self.plan.mode
    }

    pub fn deleted(&self) -> usize {
        self.count(DeletionOutcome::is_deleted)
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, DeletionOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DeletionOutcome::Failed(_)))
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&DeletionOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.outcome)).count()
    }

    /// Plan followed by one line per non-trivial outcome. Dry runs render
    /// the plan table instead.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = self.plan.lines();
        if self.mode().is_dry_run() {
            if !self.plan.is_empty() {
                let table = self.plan.table().to_string();
                lines.extend(table.lines().map(str::to_string));
            }
            return lines;
        }
        for o in &self.outcomes {
            match &o.outcome {
                DeletionOutcome::Deleted => {}
                DeletionOutcome::AlreadyDeleted => {
                    lines.push(format!("{}: already deleted", o.resource.label()))
                }
                DeletionOutcome::Skipped(reason) => {
                    lines.push(format!("{}: skipped ({reason})", o.resource.label()))
                }
                DeletionOutcome::Failed(reason) => {
                    lines.push(format!("{}: failed ({reason})", o.resource.label()))
                }
            }
        }
        lines
    }
}

/// Counts returned by [`CleanupOrchestrator::finalize_cleanup`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupCounts {
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Deleted entries dropped from the registry
    pub purged: usize,
}

pub struct CleanupOrchestrator {
    registry: ResourceRegistry,
    cloud: Arc<dyn CloudApi>,
    resilience: Arc<Resilience>,
    progress: Arc<ProgressReporter>,
    confirm: Arc<dyn Confirm>,
}

impl CleanupOrchestrator {
    pub fn new(
        registry: ResourceRegistry,
        cloud: Arc<dyn CloudApi>,
        resilience: Arc<Resilience>,
        progress: Arc<ProgressReporter>,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        Self {
            registry,
            cloud,
            resilience,
            progress,
            confirm,
        }
    }

    /// Live resources grouped by kind, in teardown order.
    ///
    /// Independent of registration order. Kinds with nothing registered are
    /// left out.
    pub fn get_resources_in_cleanup_order(&self) -> Vec<(ResourceKind, Vec<Resource>)> {
        ResourceKind::CLEANUP_ORDER
            .into_iter()
            .map(|kind| (kind, self.registry.list(kind)))
            .filter(|(_, resources)| !resources.is_empty())
            .collect()
    }

    pub fn plan(&self, mode: CleanupMode, only: Option<ResourceKind>) -> CleanupPlan {
        let steps = self
            .get_resources_in_cleanup_order()
            .into_iter()
            .filter(|(kind, _)| only.is_none_or(|k| k == *kind))
            .map(|(kind, resources)| CleanupStep { kind, resources })
            .collect();
        CleanupPlan {
            stack: self.registry.stack().to_string(),
            mode,
            steps,
        }
    }

    /// Fail if another live resource still references `id`
    pub fn check_resource_dependencies(&self, kind: ResourceKind, id: &str) -> EngineResult<()> {
        let dependents = self.registry.find_dependents(id);
        if dependents.is_empty() {
            return Ok(());
        }
        Err(EngineError::DependencyConflict {
            kind,
            id: id.to_string(),
            dependents: dependents.iter().map(Resource::label).collect(),
        })
    }

    /// Check dependencies, flag pending, delete, then drop from the registry.
    ///
    /// Not-found from the provider counts as success. Other provider errors
    /// are retried when transient and returned otherwise.
    pub async fn delete_resource_safely(
        &self,
        resource: &Resource,
        force: bool,
    ) -> EngineResult<DeletionOutcome> {
        let kind = resource.kind;
        let id = resource.id.as_str();
        if !force {
            self.check_resource_dependencies(kind, id)?;
        }

        if !self.registry.mark_pending_deletion(kind, id)? {
            debug!(kind = %kind, id = %id, "Resource no longer registered");
            return Ok(DeletionOutcome::AlreadyDeleted);
        }

        let context = ErrorContext::new("delete", resource.label());
        let service = format!("cloud:{kind}");
        let cloud = &self.cloud;
        let result = self
            .resilience
            .call(context, &service, || async {
                cloud.delete(kind, id).await.map_err(EngineError::from)
            })
            .await;

        let outcome = match result {
            Ok(()) => DeletionOutcome::Deleted,
            Err(e) if e.is_not_found() => DeletionOutcome::AlreadyDeleted,
            Err(e) => return Err(e),
        };

        self.registry.remove(kind, id)?;
        info!(kind = %kind, id = %id, stack = %resource.stack, "Deleted resource");
        Ok(outcome)
    }

    /// Execute a cleanup. Registry write failures abort the run; every
    /// other per-resource failure is recorded in the report.
    pub async fn run(&self, options: &CleanupOptions) -> EngineResult<CleanupReport> {
        let plan = self.plan(options.mode, options.only);
        info!(
            stack = %plan.stack,
            mode = %plan.mode,
            resources = plan.resource_count(),
            "Starting cleanup"
        );

        if plan.mode.is_dry_run() {
            return Ok(self.dry_run(plan));
        }

        let mut bar = self
            .progress
            .bar(format!("Cleaning up {}", plan.stack), plan.resource_count() as u64)?;
        let mut outcomes = Vec::with_capacity(plan.resource_count());

        if plan.mode == CleanupMode::Emergency {
            warn!(stack = %plan.stack, "Emergency cleanup: skipping dependency checks and ordering");
            let all: Vec<&Resource> = plan.steps.iter().flat_map(|s| &s.resources).collect();
            let results = join_all(all.iter().map(|r| self.delete_resource_safely(r, true))).await;
            if let Err(e) = Self::collect(&all, results, &mut outcomes) {
                bar.abandon("aborted, registry write failed");
                return Err(e);
            }
            bar.inc(all.len() as u64);
        } else {
            for step in &plan.steps {
                let mut approved = Vec::with_capacity(step.resources.len());
                for resource in &step.resources {
                    if self.needs_confirmation(options) && !self.confirm.confirm(resource) {
                        info!(resource = %resource.label(), "Not confirmed, skipping");
                        outcomes.push(ResourceOutcome {
                            resource: resource.clone(),
                            outcome: DeletionOutcome::Skipped("not confirmed".to_string()),
                        });
                        bar.inc(1);
                    } else {
                        approved.push(resource);
                    }
                }

                debug!(kind = %step.kind, count = approved.len(), "Deleting kind");
                let results = join_all(
                    approved
                        .iter()
                        .map(|r| self.delete_resource_safely(r, options.force)),
                )
                .await;
                if let Err(e) = Self::collect(&approved, results, &mut outcomes) {
                    bar.abandon("aborted, registry write failed");
                    return Err(e);
                }
                bar.inc(approved.len() as u64);
            }
        }
        bar.finish();

        let report = CleanupReport { plan, outcomes };
        info!(
            deleted = report.deleted(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Cleanup finished"
        );
        Ok(report)
    }

    fn needs_confirmation(&self, options: &CleanupOptions) -> bool {
        options.mode == CleanupMode::Manual && !options.force
    }

    fn dry_run(&self, plan: CleanupPlan) -> CleanupReport {
        let mut outcomes = Vec::with_capacity(plan.resource_count());
        for step in &plan.steps {
            for resource in &step.resources {
                let dependents = self.registry.find_dependents(&resource.id);
                info!(
                    kind = %step.kind,
                    id = %resource.id,
                    dependents = dependents.len(),
                    "[DRY RUN] Would delete resource"
                );
                outcomes.push(ResourceOutcome {
                    resource: resource.clone(),
                    outcome: DeletionOutcome::Skipped("dry run".to_string()),
                });
            }
        }
        CleanupReport { plan, outcomes }
    }

    fn collect(
        resources: &[&Resource],
        results: Vec<EngineResult<DeletionOutcome>>,
        outcomes: &mut Vec<ResourceOutcome>,
    ) -> EngineResult<()> {
        let mut fatal = None;
        for (resource, result) in resources.iter().zip(results) {
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) if matches!(e.root(), EngineError::Registry { .. }) => {
                    fatal.get_or_insert(e);
                    continue;
                }
                Err(e) => {
                    warn!(resource = %resource.label(), error = %e, "Failed to delete resource");
                    DeletionOutcome::Failed(e.to_string())
                }
            };
            outcomes.push(ResourceOutcome {
                resource: (*resource).clone(),
                outcome,
            });
        }
        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Drop deleted entries and persist a completion record.
    ///
    /// Dry runs change nothing and only report counts.
    pub fn finalize_cleanup(&self, report: &CleanupReport) -> EngineResult<CleanupCounts> {
        let mut counts = CleanupCounts {
            deleted: report.deleted(),
            skipped: report.skipped(),
            failed: report.failed(),
            purged: 0,
        };
        if report.mode().is_dry_run() {
            return Ok(counts);
        }

        counts.purged = self.registry.purge_deleted()?;
        self.registry.record_cleanup(CleanupRecord {
            completed_at: Utc::now(),
            mode: report.mode().as_str().to_string(),
            deleted: counts.deleted,
            skipped: counts.skipped,
            failed: counts.failed,
        })?;
        Ok(counts)
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }
}
