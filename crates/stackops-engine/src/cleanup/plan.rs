//! Cleanup modes and teardown plans

use crate::error::EngineError;
use crate::registry::Resource;
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde::{Deserialize, Serialize};
use stackops_common::ResourceKind;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupMode {
    /// Strict dependency order, no confirmation
    #[default]
    Automatic,
    /// Dependency order, each resource confirmed unless forced
    Manual,
    /// Best effort: no dependency checks, everything concurrently
    Emergency,
    /// Plan only, no mutating calls
    DryRun,
}

impl CleanupMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CleanupMode::Automatic => "automatic",
            CleanupMode::Manual => "manual",
            CleanupMode::Emergency => "emergency",
            CleanupMode::DryRun => "dry-run",
        }
    }

    pub fn is_dry_run(self) -> bool {
        self == CleanupMode::DryRun
    }
}

impl fmt::Display for CleanupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CleanupMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "automatic" | "auto" => Ok(CleanupMode::Automatic),
            "manual" => Ok(CleanupMode::Manual),
            "emergency" => Ok(CleanupMode::Emergency),
            "dry-run" | "dryrun" => Ok(CleanupMode::DryRun),
            other => Err(EngineError::validation(
                "cleanup",
                format!("unknown cleanup mode '{other}' (expected automatic, manual, emergency or dry-run)"),
            )),
        }
    }
}

/// Resources of one kind, deleted together
#[derive(Debug, Clone)]
pub struct CleanupStep {
    pub kind: ResourceKind,
    pub resources: Vec<Resource>,
}

/// Ordered teardown of a stack
#[derive(Debug, Clone)]
pub struct CleanupPlan {
    pub stack: String,
    pub mode: CleanupMode,
    /// Steps in teardown order; kinds without live resources are omitted
    pub steps: Vec<CleanupStep>,
}

impl CleanupPlan {
    pub fn resource_count(&self) -> usize {
        self.steps.iter().map(|s| s.resources.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.steps.iter().map(|s| s.kind).collect()
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Step"),
                Cell::new("Type"),
                Cell::new("ID"),
                Cell::new("Status"),
                Cell::new("Created"),
            ]);

        for (i, step) in self.steps.iter().enumerate() {
            for resource in &step.resources {
                table.add_row(vec![
                    Cell::new(i + 1),
                    Cell::new(step.kind.as_str()),
                    Cell::new(&resource.id),
                    Cell::new(resource.status.as_str()),
                    Cell::new(resource.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
                ]);
            }
        }
        table
    }

    /// Human-readable plan. Never empty, even for an empty stack.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Cleanup plan for stack '{}' ({} mode): {} resources",
            self.stack,
            self.mode,
            self.resource_count()
        )];
        if self.steps.is_empty() {
            lines.push("No resources registered".to_string());
            return lines;
        }
        for (i, step) in self.steps.iter().enumerate() {
            let ids: Vec<&str> = step.resources.iter().map(|r| r.id.as_str()).collect();
            lines.push(format!("{}. {}: {}", i + 1, step.kind, ids.join(", ")));
        }
        lines
    }
}
