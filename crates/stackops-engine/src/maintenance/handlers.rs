//! Maintenance operation handlers
//!
//! Each handler receives an already validated request. With `dry_run` set,
//! handlers run their full decision logic but skip every mutation and
//! report what they would have done instead.

use super::report::OperationReport;
use super::request::{MaintenanceRequest, OperationKind, Scope, ValidationType};
use crate::cleanup::{CleanupMode, CleanupOptions};
use crate::cloud::{Metadata, is_healthy_state};
use crate::engine::{Components, MISSING_STATE, describe_key};
use crate::error::{EngineError, EngineResult};
use crate::perf::{BatchJob, JobScope, JobStatus};
use crate::registry::{
    Resource, ResourceStatus, SCHEMA_VERSION, StackRecord, read_record, registry_error,
    write_atomic,
};
use crate::resilience::FallbackSource;
use anyhow::Context;
use chrono::Utc;
use futures::FutureExt;
use futures::future::BoxFuture;
use stackops_common::ResourceKind;
use stackops_common::tags::TAG_MANAGED_BY_VALUE;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

type HandlerFuture<'a> = BoxFuture<'a, EngineResult<OperationReport>>;

/// Default idle age for `optimize`'s connection trim
const DEFAULT_MAX_IDLE_SECS: u64 = 300;

pub(super) fn fix<'a>(c: &'a Components, req: &'a MaintenanceRequest) -> HandlerFuture<'a> {
    run_fix(c, req).boxed()
}

pub(super) fn cleanup<'a>(c: &'a Components, req: &'a MaintenanceRequest) -> HandlerFuture<'a> {
    run_cleanup(c, req).boxed()
}

pub(super) fn update<'a>(c: &'a Components, req: &'a MaintenanceRequest) -> HandlerFuture<'a> {
    run_update(c, req).boxed()
}

pub(super) fn health<'a>(c: &'a Components, req: &'a MaintenanceRequest) -> HandlerFuture<'a> {
    run_health(c, req).boxed()
}

pub(super) fn backup<'a>(c: &'a Components, req: &'a MaintenanceRequest) -> HandlerFuture<'a> {
    async move { run_backup(c, req) }.boxed()
}

pub(super) fn restore<'a>(c: &'a Components, req: &'a MaintenanceRequest) -> HandlerFuture<'a> {
    async move { run_restore(c, req) }.boxed()
}

pub(super) fn validate<'a>(c: &'a Components, req: &'a MaintenanceRequest) -> HandlerFuture<'a> {
    async move { run_validate(c, req) }.boxed()
}

pub(super) fn optimize<'a>(c: &'a Components, req: &'a MaintenanceRequest) -> HandlerFuture<'a> {
    async move { run_optimize(c, req) }.boxed()
}

/// Resources named by a target: every live resource of a kind, or one id
fn resolve_target(c: &Components, operation: OperationKind, target: &str) -> EngineResult<Vec<Resource>> {
    if let Ok(kind) = target.parse::<ResourceKind>() {
        return Ok(c.registry.list(kind));
    }
    c.registry
        .find(target)
        .map(|r| vec![r])
        .ok_or_else(|| {
            EngineError::validation(
                operation.as_str(),
                format!("no registered resource or resource type matches '{target}'"),
            )
        })
}

/// A request naming a stack must name the one this engine manages
fn ensure_stack(c: &Components, operation: OperationKind, stack: Option<&str>) -> EngineResult<()> {
    match stack {
        Some(stack) if stack == c.registry.stack() => Ok(()),
        Some(stack) => Err(EngineError::validation(
            operation.as_str(),
            format!(
                "engine manages stack '{}', not '{stack}'",
                c.registry.stack()
            ),
        )),
        None => Err(EngineError::validation(
            operation.as_str(),
            "stack name is required",
        )),
    }
}

fn required<'r>(operation: OperationKind, what: &str, value: Option<&'r str>) -> EngineResult<&'r str> {
    value.ok_or_else(|| EngineError::validation(operation.as_str(), format!("{what} is required")))
}

/// Ownership tags are regenerated on create; everything else is carried over
fn user_properties(metadata: &Metadata) -> Metadata {
    let prefix = format!("{TAG_MANAGED_BY_VALUE}:");
    metadata
        .iter()
        .filter(|(k, _)| !k.starts_with(&prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

async fn run_fix(c: &Components, req: &MaintenanceRequest) -> EngineResult<OperationReport> {
    let op = OperationKind::Fix;
    let target = required(op, "target", req.target.as_deref())?;
    let resources = resolve_target(c, op, target)?;
    let mut report = OperationReport::new(op, req.dry_run);
    if resources.is_empty() {
        report.line(format!("No resources registered for '{target}'"));
        return Ok(report);
    }

    let describer = c.describer();
    for resource in &resources {
        let label = resource.label();
        if resource.status == ResourceStatus::PendingDeletion {
            settle_pending_deletion(c, resource, req.dry_run, &mut report).await;
            continue;
        }
        match describer.describe(resource.kind, &resource.id).await {
            Ok(desc) if desc.is_healthy() => report.count("healthy", 1),
            Ok(desc) => {
                report.count("unhealthy", 1);
                report.line(format!("{label}: state '{}', left in place", desc.state));
            }
            Err(e) if e.is_not_found() => {
                if req.dry_run {
                    info!(resource = %label, "[DRY RUN] Would re-provision missing resource");
                    report.count("reprovisioned", 1);
                    report.line(format!("{label}: missing, would re-provision"));
                    continue;
                }
                match reprovision(c, resource).await {
                    Ok(replacement) => {
                        report.count("reprovisioned", 1);
                        report.line(format!("{label}: missing, re-provisioned as {}", replacement.id));
                    }
                    Err(e) => {
                        warn!(resource = %label, error = %e, "Re-provision failed");
                        report.count("failed", 1);
                        report.line(format!("{label}: re-provision failed: {e}"));
                    }
                }
            }
            Err(e) => {
                report.count("failed", 1);
                report.line(format!("{label}: describe failed: {e}"));
            }
        }
    }
    report.partial_if(report.get("failed") > 0);
    Ok(report)
}

/// A resource left mid-teardown is never re-provisioned. If the provider
/// already deleted it, the registry entry is retired; otherwise it is left
/// for the next cleanup.
async fn settle_pending_deletion(
    c: &Components,
    resource: &Resource,
    dry_run: bool,
    report: &mut OperationReport,
) {
    let label = resource.label();
    match c.describer().describe(resource.kind, &resource.id).await {
        Ok(_) => {
            report.count("pending_deletion", 1);
            report.line(format!("{label}: deletion in progress, left for cleanup"));
        }
        Err(e) if e.is_not_found() => {
            if dry_run {
                report.line(format!("{label}: already deleted, would retire entry"));
            } else if let Err(e) = c.registry.remove(resource.kind, &resource.id) {
                report.count("failed", 1);
                report.line(format!("{label}: could not retire entry: {e}"));
                return;
            } else {
                info!(resource = %label, "Retired entry of interrupted deletion");
                report.line(format!("{label}: already deleted, entry retired"));
            }
            report.count("retired", 1);
        }
        Err(e) => {
            report.count("failed", 1);
            report.line(format!("{label}: describe failed: {e}"));
        }
    }
}

/// Create a replacement, point references at it, retire the old entry
async fn reprovision(c: &Components, old: &Resource) -> EngineResult<Resource> {
    let replacement = c.provision(old.kind, user_properties(&old.metadata)).await?;
    let rewritten = c.registry.rewrite_references(&old.id, &replacement.id)?;
    c.registry.remove(old.kind, &old.id)?;
    c.cache.remove(&describe_key(old.kind, &old.id))?;
    info!(
        kind = %old.kind,
        old = %old.id,
        new = %replacement.id,
        references = rewritten,
        "Replaced missing resource"
    );
    Ok(replacement)
}

async fn run_update(c: &Components, req: &MaintenanceRequest) -> EngineResult<OperationReport> {
    let op = OperationKind::Update;
    let target = required(op, "target or component", req.target_or_component())?;
    let resources = resolve_target(c, op, target)?;
    let mut report = OperationReport::new(op, req.dry_run);

    let describer = c.describer();
    for resource in &resources {
        let label = resource.label();
        if resource.status == ResourceStatus::PendingDeletion {
            report.count("pending_deletion", 1);
            report.line(format!("{label}: deletion in progress, not updated"));
            continue;
        }
        let desc = match describer.describe(resource.kind, &resource.id).await {
            Ok(desc) => desc,
            Err(e) if e.is_not_found() => {
                report.count("missing", 1);
                report.line(format!("{label}: missing at provider, run fix"));
                continue;
            }
            Err(e) => {
                report.count("failed", 1);
                report.line(format!("{label}: describe failed: {e}"));
                continue;
            }
        };

        let changed: Vec<&String> = desc
            .metadata
            .iter()
            .filter(|(k, v)| resource.metadata.get(*k) != Some(*v))
            .map(|(k, _)| k)
            .collect();
        if changed.is_empty() {
            report.count("unchanged", 1);
            continue;
        }
        let keys: Vec<&str> = changed.iter().map(|k| k.as_str()).collect();
        if req.dry_run {
            report.line(format!("{label}: would update {}", keys.join(", ")));
        } else {
            let mut merged = resource.metadata.clone();
            merged.extend(desc.metadata.clone());
            c.registry.register(resource.kind, &resource.id, merged)?;
            report.line(format!("{label}: updated {}", keys.join(", ")));
        }
        report.count("updated", 1);
    }
    report.partial_if(report.get("failed") > 0);
    Ok(report)
}

async fn run_health(c: &Components, req: &MaintenanceRequest) -> EngineResult<OperationReport> {
    let mut report = OperationReport::new(OperationKind::Health, req.dry_run);
    let (resources, deleting): (Vec<Resource>, Vec<Resource>) = c
        .registry
        .active_resources()
        .into_iter()
        .partition(|r| r.status == ResourceStatus::Active);
    for resource in &deleting {
        report.count("pending_deletion", 1);
        report.line(format!("{}: deletion in progress", resource.label()));
    }
    let mut spinner = c
        .progress
        .spinner(format!("Checking {} resources", resources.len()))?;

    let mut states: Vec<(String, String)> = Vec::with_capacity(resources.len());
    let mut pending: HashMap<String, (String, String)> = HashMap::new();
    let mut jobs = Vec::new();
    // Jobs whose provider call failed and were answered from the cache
    let stale: Arc<Mutex<HashSet<String>>> = Arc::default();
    for resource in resources {
        let label = resource.label();
        let key = describe_key(resource.kind, &resource.id);
        if !req.force {
            if let Some(state) = c.cache.get(&key)? {
                report.count("cached", 1);
                states.push((label, state));
                continue;
            }
        }

        let job_id = format!("health-{}", Uuid::new_v4());
        let describer = c.describer();
        let (kind, id) = (resource.kind, resource.id);
        let stale = Arc::clone(&stale);
        let stale_id = job_id.clone();
        jobs.push(BatchJob::new(
            job_id.clone(),
            format!("describe {label}"),
            async move {
                let outcome = describer.describe_state(kind, &id).await?;
                if outcome.source == FallbackSource::Secondary {
                    stale
                        .lock()
                        .unwrap_or_else(|p| p.into_inner())
                        .insert(stale_id);
                }
                Ok(outcome.value)
            },
        ));
        pending.insert(job_id, (label, key));
    }
    spinner.tick();

    let batch = c.workers.batch(jobs, None).await?;
    let stale = std::mem::take(&mut *stale.lock().unwrap_or_else(|p| p.into_inner()));
    for record in batch.records {
        let Some((label, key)) = pending.remove(&record.id) else {
            continue;
        };
        match (record.status, record.output) {
            (JobStatus::Completed, Some(state)) if stale.contains(&record.id) => {
                report.count("stale", 1);
                report.line(format!("{label}: provider unavailable, last known state '{state}'"));
                states.push((label, state));
            }
            (JobStatus::Completed, Some(state)) => {
                c.cache.set(key, state.clone(), None)?;
                states.push((label, state));
            }
            (status, _) => {
                report.count("erroring", 1);
                let reason = record.error.unwrap_or_else(|| status.as_str().to_string());
                report.line(format!("{label}: check failed: {reason}"));
            }
        }
    }

    for (label, state) in &states {
        if is_healthy_state(state) {
            report.count("healthy", 1);
        } else if state == MISSING_STATE {
            report.count("missing", 1);
            report.line(format!("{label}: missing"));
        } else {
            report.count("unhealthy", 1);
            report.line(format!("{label}: {state}"));
        }
    }
    for key in ["healthy", "unhealthy", "missing", "erroring"] {
        c.metrics
            .gauge(&format!("health.{key}"), report.get(key) as f64)?;
    }

    spinner.finish(&format!(
        "{} healthy, {} unhealthy, {} missing, {} erroring",
        report.get("healthy"),
        report.get("unhealthy"),
        report.get("missing"),
        report.get("erroring")
    ));
    report.partial_if(report.get("erroring") > 0);
    Ok(report)
}

fn default_backup_path(state_dir: &Path, stack: &str) -> PathBuf {
    state_dir
        .join("backups")
        .join(format!("{stack}-{}.json", Utc::now().format("%Y%m%dT%H%M%SZ")))
}

fn write_backup(path: &Path, record: &StackRecord) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec_pretty(record).context("Failed to serialize backup")?;
    write_atomic(path, &bytes).with_context(|| format!("Failed to write backup {}", path.display()))
}

fn run_backup(c: &Components, req: &MaintenanceRequest) -> EngineResult<OperationReport> {
    let op = OperationKind::Backup;
    ensure_stack(c, op, req.stack_name.as_deref())?;
    let stack = c.registry.stack();
    let path = req
        .backup_file
        .clone()
        .unwrap_or_else(|| default_backup_path(c.registry.store().state_dir(), stack));

    let mut report = OperationReport::new(op, req.dry_run);
    let record = c.registry.snapshot();
    let live = record.live_count();
    if req.dry_run {
        report.line(format!("Would write {live} resources to {}", path.display()));
    } else {
        write_backup(&path, &record).map_err(|e| registry_error(stack, &e))?;
        info!(stack = %stack, path = %path.display(), resources = live, "Wrote backup");
        report.line(format!("Wrote {live} resources to {}", path.display()));
    }
    report.count("resources", live);
    Ok(report)
}

fn run_restore(c: &Components, req: &MaintenanceRequest) -> EngineResult<OperationReport> {
    let op = OperationKind::Restore;
    ensure_stack(c, op, req.stack_name.as_deref())?;
    let stack = c.registry.stack();
    let path = req
        .backup_file
        .as_deref()
        .ok_or_else(|| EngineError::validation(op.as_str(), "backup file is required"))?;

    let record = read_record(path).map_err(|e| registry_error(stack, &e))?;
    if record.stack != stack {
        return Err(EngineError::validation(
            op.as_str(),
            format!("backup belongs to stack '{}', not '{stack}'", record.stack),
        ));
    }

    let mut report = OperationReport::new(op, req.dry_run);
    if req.dry_run {
        let live = record.live_count();
        report.line(format!("Would restore {live} resources from {}", path.display()));
        report.count("resources", live);
    } else {
        let live = c.registry.replace_from(record)?;
        report.line(format!("Restored {live} resources from {}", path.display()));
        report.count("resources", live);
    }
    Ok(report)
}

fn run_validate(c: &Components, req: &MaintenanceRequest) -> EngineResult<OperationReport> {
    let mut report = OperationReport::new(OperationKind::Validate, req.dry_run);
    let selected = req.validation_type.unwrap_or_default();
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    if selected.includes(ValidationType::Registry) {
        let record = c.registry.snapshot();
        if record.schema_version != SCHEMA_VERSION {
            issues.push(format!(
                "record schema v{} (current v{SCHEMA_VERSION})",
                record.schema_version
            ));
        }
        if record.region != c.config.region() {
            issues.push(format!(
                "record region '{}' differs from configured '{}'",
                record.region,
                c.config.region()
            ));
        }
        if record.environment != c.config.environment() {
            issues.push(format!(
                "record environment '{}' differs from configured '{}'",
                record.environment,
                c.config.environment()
            ));
        }
        for (kind, entries) in &record.resources {
            for entry in entries {
                if entry.status == ResourceStatus::PendingDeletion {
                    issues.push(format!(
                        "{kind}/{}: left pending deletion by an interrupted cleanup",
                        entry.id
                    ));
                }
            }
        }
        report.count("checked.registry", record.live_count());
    }

    if selected.includes(ValidationType::Dependencies) {
        let active = c.registry.active_resources();
        for resource in &active {
            for dependent in c.registry.find_dependents(&resource.id) {
                if dependent.kind.cleanup_priority() > resource.kind.cleanup_priority() {
                    issues.push(format!(
                        "{} references {} but is torn down after it",
                        dependent.label(),
                        resource.label()
                    ));
                }
            }
        }
        for kind in ResourceKind::CLEANUP_ORDER {
            if c.registry.list(kind).is_empty() {
                continue;
            }
            for needed in kind.depends_on() {
                if c.registry.list(*needed).is_empty() {
                    warnings.push(format!("{kind} registered without any {needed}"));
                }
            }
        }
        report.count("checked.dependencies", active.len());
    }

    if selected.includes(ValidationType::Config) {
        if let Err(e) = c.config.validate() {
            issues.push(format!("config: {e}"));
        }
        report.count("checked.config", 1);
    }

    for issue in &issues {
        report.line(format!("issue: {issue}"));
    }
    for warning in &warnings {
        report.line(format!("warning: {warning}"));
    }
    if issues.is_empty() {
        report.line("No issues found");
    }
    report.count("issues", issues.len());
    report.count("warnings", warnings.len());
    report.partial_if(!issues.is_empty());
    Ok(report)
}

fn run_optimize(c: &Components, req: &MaintenanceRequest) -> EngineResult<OperationReport> {
    let mut report = OperationReport::new(OperationKind::Optimize, req.dry_run);
    let dry_run = req.dry_run;

    let steps: [(&str, EngineResult<String>); 4] = [
        ("purge-cache", purge_cache(c, dry_run)),
        ("discard-jobs", discard_jobs(c, dry_run)),
        ("trim-connections", trim_connections(c, req)),
        ("summarise-metrics", summarise_metrics(c)),
    ];
    for (step, result) in steps {
        match result {
            Ok(summary) => {
                report.count("steps.ok", 1);
                report.line(format!("{step}: {summary}"));
            }
            Err(e) => {
                warn!(step = %step, error = %e, "Optimization step failed");
                report.count("steps.failed", 1);
                report.line(format!("{step}: failed: {e}"));
            }
        }
    }
    report.partial_if(report.get("steps.failed") > 0);
    Ok(report)
}

fn purge_cache(c: &Components, dry_run: bool) -> EngineResult<String> {
    if dry_run {
        return Ok(format!("would purge expired entries ({} cached)", c.cache.len()?));
    }
    Ok(format!("purged {} expired entries", c.cache.purge_expired()?))
}

fn discard_jobs(c: &Components, dry_run: bool) -> EngineResult<String> {
    if dry_run {
        let stats = c.workers.stats()?;
        let finished = stats.completed + stats.failed + stats.timed_out;
        return Ok(format!("would discard {finished} finished jobs"));
    }
    Ok(format!(
        "discarded {} finished jobs",
        c.workers.cleanup(JobScope::Finished)?
    ))
}

fn trim_connections(c: &Components, req: &MaintenanceRequest) -> EngineResult<String> {
    let max_idle_secs = match req.parameters.get("max_idle_secs") {
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            EngineError::validation("optimize", format!("max_idle_secs must be a number, got '{raw}'"))
        })?,
        None => DEFAULT_MAX_IDLE_SECS,
    };
    if req.dry_run {
        let idle = c.connections.stats()?.idle;
        return Ok(format!(
            "would close idle connections older than {max_idle_secs}s ({idle} idle)"
        ));
    }
    let trimmed = c
        .connections
        .trim_idle(Duration::from_secs(max_idle_secs))?;
    Ok(format!("closed {trimmed} idle connections"))
}

fn summarise_metrics(c: &Components) -> EngineResult<String> {
    let snapshot = c.metrics.snapshot()?;
    let operations: u64 = snapshot
        .counters
        .iter()
        .filter(|(name, _)| name.starts_with("maintenance.") && !name.ends_with(".errors"))
        .map(|(_, n)| n)
        .sum();
    let errors: u64 = snapshot
        .counters
        .iter()
        .filter(|(name, _)| name.ends_with(".errors"))
        .map(|(_, n)| n)
        .sum();
    Ok(format!(
        "{operations} operations, {errors} errors, {} timers",
        snapshot.histograms.len()
    ))
}

async fn run_cleanup(c: &Components, req: &MaintenanceRequest) -> EngineResult<OperationReport> {
    let op = OperationKind::Cleanup;
    let mut report = OperationReport::new(op, req.dry_run);
    let scope = req
        .scope
        .ok_or_else(|| EngineError::validation(op.as_str(), "scope is required"))?;

    match scope {
        Scope::Stack => {
            ensure_stack(c, op, req.stack_name.as_deref())?;
            teardown(c, req, None, &mut report).await?;
        }
        Scope::Resources => {
            let target = required(op, "target resource type", req.target.as_deref())?;
            let kind = target
                .parse::<ResourceKind>()
                .map_err(|e| EngineError::validation(op.as_str(), e.to_string()))?;
            teardown(c, req, Some(kind), &mut report).await?;
        }
        Scope::Jobs => {
            let job_scope = match req.parameters.get("job_scope") {
                Some(raw) => raw.parse::<JobScope>()?,
                None => JobScope::Finished,
            };
            if req.dry_run {
                let stats = c.workers.stats()?;
                let finished = stats.completed + stats.failed + stats.timed_out;
                report.line(format!("Would discard up to {finished} finished jobs ({job_scope:?})"));
            } else {
                let discarded = c.workers.cleanup(job_scope)?;
                report.line(format!("Discarded {discarded} finished jobs"));
                report.count("discarded", discarded);
            }
        }
        Scope::Cache => {
            if req.dry_run {
                report.line(format!("Would purge expired entries ({} cached)", c.cache.len()?));
            } else {
                let purged = c.cache.purge_expired()?;
                report.line(format!("Purged {purged} expired cache entries"));
                report.count("purged", purged);
            }
        }
    }
    Ok(report)
}

/// Stack or single-kind teardown through the orchestrator
async fn teardown(
    c: &Components,
    req: &MaintenanceRequest,
    only: Option<ResourceKind>,
    report: &mut OperationReport,
) -> EngineResult<()> {
    let mode = if req.dry_run {
        CleanupMode::DryRun
    } else {
        req.mode.unwrap_or_default()
    };
    let mut options = CleanupOptions::new(mode).force(req.force);
    if let Some(kind) = only {
        options = options.only(kind);
    }

    let outcome = c.orchestrator.run(&options).await?;
    let counts = c.orchestrator.finalize_cleanup(&outcome)?;
    for line in outcome.lines() {
        report.line(line);
    }
    report.count("planned", outcome.plan.resource_count());
    report.count("deleted", counts.deleted);
    report.count("skipped", counts.skipped);
    report.count("failed", counts.failed);
    report.count("purged", counts.purged);
    report.partial_if(counts.failed > 0);

    if !mode.is_dry_run() {
        for step in &outcome.plan.steps {
            for resource in &step.resources {
                c.cache.remove(&describe_key(resource.kind, &resource.id))?;
            }
        }
    }
    Ok(())
}
