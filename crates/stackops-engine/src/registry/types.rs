//! Registry record types

use crate::cloud::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackops_common::ResourceKind;
use stackops_common::defaults::{default_environment, default_region};
use std::collections::BTreeMap;
use std::fmt;

/// Current on-disk schema version
pub const SCHEMA_VERSION: u32 = 2;

/// Records written before `schema_version` existed
fn legacy_schema_version() -> u32 {
    1
}

/// Lifecycle status of a registered resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceStatus {
    #[default]
    Active,
    /// Deletion was issued but not yet confirmed
    PendingDeletion,
    Deleted,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Active => "active",
            ResourceStatus::PendingDeletion => "pending-deletion",
            ResourceStatus::Deleted => "deleted",
        }
    }

    /// Still present at the provider as far as the registry knows
    pub fn is_live(&self) -> bool {
        !matches!(self, ResourceStatus::Deleted)
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource as stored in the stack record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub id: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ResourceEntry {
    pub fn new(id: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            metadata,
            created_at: Utc::now(),
            status: ResourceStatus::Active,
            deleted_at: None,
        }
    }

    /// Check whether any metadata value references `id`.
    ///
    /// Values may hold a single id or a comma-separated list of ids.
    pub fn references(&self, id: &str) -> bool {
        self.metadata
            .values()
            .any(|v| v.split(',').map(str::trim).any(|part| part == id))
    }
}

/// A registered resource, as returned to callers
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: String,
    pub kind: ResourceKind,
    pub stack: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub status: ResourceStatus,
}

impl Resource {
    pub(crate) fn from_entry(stack: &str, kind: ResourceKind, entry: &ResourceEntry) -> Self {
        Self {
            id: entry.id.clone(),
            kind,
            stack: stack.to_string(),
            metadata: entry.metadata.clone(),
            created_at: entry.created_at,
            status: entry.status,
        }
    }

    /// `kind/id`, used as log and report target
    pub fn label(&self) -> String {
        format!("{}/{}", self.kind, self.id)
    }
}

/// Completion record appended by `finalize_cleanup`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupRecord {
    pub completed_at: DateTime<Utc>,
    pub mode: String,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Durable per-stack record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackRecord {
    #[serde(default = "legacy_schema_version")]
    pub schema_version: u32,
    pub stack: String,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub resources: BTreeMap<ResourceKind, Vec<ResourceEntry>>,
    #[serde(default)]
    pub cleanups: Vec<CleanupRecord>,
}

impl StackRecord {
    pub fn new(
        stack: impl Into<String>,
        region: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            stack: stack.into(),
            created_at: Utc::now(),
            region: region.into(),
            environment: environment.into(),
            resources: BTreeMap::new(),
            cleanups: Vec::new(),
        }
    }

    /// Upgrade an older record in place. Returns true if anything changed.
    pub fn migrate(&mut self) -> bool {
        if self.schema_version >= SCHEMA_VERSION {
            return false;
        }
        // v1 had no per-entry status, only an optional deletion timestamp
        for entry in self.resources.values_mut().flatten() {
            if entry.deleted_at.is_some() {
                entry.status = ResourceStatus::Deleted;
            }
        }
        self.schema_version = SCHEMA_VERSION;
        true
    }

    pub(crate) fn entry(&self, kind: ResourceKind, id: &str) -> Option<&ResourceEntry> {
        self.resources.get(&kind)?.iter().find(|e| e.id == id)
    }

    pub(crate) fn entry_mut(&mut self, kind: ResourceKind, id: &str) -> Option<&mut ResourceEntry> {
        self.resources.get_mut(&kind)?.iter_mut().find(|e| e.id == id)
    }

    /// Live entries, grouped by kind in cleanup order
    pub fn live_entries(&self) -> impl Iterator<Item = (ResourceKind, &ResourceEntry)> {
        self.resources
            .iter()
            .flat_map(|(kind, entries)| entries.iter().map(move |e| (*kind, e)))
            .filter(|(_, e)| e.status.is_live())
    }

    pub fn live_count(&self) -> usize {
        self.live_entries().count()
    }
}
