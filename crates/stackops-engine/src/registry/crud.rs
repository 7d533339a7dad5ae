//! Registry operations

use super::ResourceRegistry;
use super::types::{CleanupRecord, Resource, ResourceEntry, ResourceStatus, StackRecord};
use crate::cloud::Metadata;
use crate::error::{EngineError, EngineResult};
use chrono::Utc;
use stackops_common::ResourceKind;
use tracing::{debug, info};

impl ResourceRegistry {
    /// Record a confirmed resource.
    ///
    /// Idempotent: re-registering a live id replaces its metadata without
    /// duplicating it. Registering a previously deleted id revives it.
    pub fn register(
        &self,
        kind: ResourceKind,
        id: &str,
        metadata: Metadata,
    ) -> EngineResult<Resource> {
        let stack = self.stack().to_string();
        let resource = self.mutate(|record| {
            let entries = record.resources.entry(kind).or_default();
            let idx = match entries.iter().position(|e| e.id == id) {
                Some(idx) => {
                    let entry = &mut entries[idx];
                    if !entry.status.is_live() {
                        entry.created_at = Utc::now();
                        entry.deleted_at = None;
                    }
                    entry.status = ResourceStatus::Active;
                    entry.metadata = metadata;
                    idx
                }
                None => {
                    entries.push(ResourceEntry::new(id, metadata));
                    entries.len() - 1
                }
            };
            Resource::from_entry(&stack, kind, &entries[idx])
        })?;

        debug!(stack = %self.stack(), kind = %kind, id = %id, "Registered resource");
        Ok(resource)
    }

    pub fn exists(&self, kind: ResourceKind, id: &str) -> bool {
        self.read(|record| record.entry(kind, id).is_some_and(|e| e.status.is_live()))
    }

    /// Live resources of one kind, in registration order
    pub fn list(&self, kind: ResourceKind) -> Vec<Resource> {
        self.read(|record| {
            record
                .resources
                .get(&kind)
                .map(|entries| {
                    entries
                        .iter()
                        .filter(|e| e.status.is_live())
                        .map(|e| Resource::from_entry(self.stack(), kind, e))
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    pub fn get(&self, kind: ResourceKind, id: &str) -> Option<Resource> {
        self.read(|record| {
            record
                .entry(kind, id)
                .filter(|e| e.status.is_live())
                .map(|e| Resource::from_entry(self.stack(), kind, e))
        })
    }

    /// Find a live resource by id, whatever its kind
    pub fn find(&self, id: &str) -> Option<Resource> {
        self.read(|record| {
            record
                .live_entries()
                .find(|(_, e)| e.id == id)
                .map(|(kind, e)| Resource::from_entry(self.stack(), kind, e))
        })
    }

    /// All live resources, grouped by kind in cleanup order
    pub fn active_resources(&self) -> Vec<Resource> {
        self.read(|record| {
            record
                .live_entries()
                .map(|(kind, e)| Resource::from_entry(self.stack(), kind, e))
                .collect()
        })
    }

    /// Live resources whose metadata references `id`
    pub fn find_dependents(&self, id: &str) -> Vec<Resource> {
        self.read(|record| {
            record
                .live_entries()
                .filter(|(_, e)| e.id != id && e.references(id))
                .map(|(kind, e)| Resource::from_entry(self.stack(), kind, e))
                .collect()
        })
    }

    /// Durably flag a resource before its delete call is issued.
    ///
    /// Returns false if the resource is not registered.
    pub fn mark_pending_deletion(&self, kind: ResourceKind, id: &str) -> EngineResult<bool> {
        if !self.exists(kind, id) {
            return Ok(false);
        }
        self.mutate(|record| match record.entry_mut(kind, id) {
            Some(entry) if entry.status.is_live() => {
                entry.status = ResourceStatus::PendingDeletion;
                true
            }
            _ => false,
        })
    }

    /// Mark a resource deleted. Returns false if it was not live.
    pub fn remove(&self, kind: ResourceKind, id: &str) -> EngineResult<bool> {
        if !self.exists(kind, id) {
            return Ok(false);
        }
        let removed = self.mutate(|record| match record.entry_mut(kind, id) {
            Some(entry) if entry.status.is_live() => {
                entry.status = ResourceStatus::Deleted;
                entry.deleted_at = Some(Utc::now());
                true
            }
            _ => false,
        })?;
        if removed {
            debug!(stack = %self.stack(), kind = %kind, id = %id, "Removed resource");
        }
        Ok(removed)
    }

    /// Point metadata references at a replacement resource.
    pub fn rewrite_references(&self, old_id: &str, new_id: &str) -> EngineResult<usize> {
        if self.find_dependents(old_id).is_empty() {
            return Ok(0);
        }
        self.mutate(|record| {
            let mut rewritten = 0;
            for entry in record.resources.values_mut().flatten() {
                if !entry.status.is_live() || !entry.references(old_id) {
                    continue;
                }
                for value in entry.metadata.values_mut() {
                    let parts: Vec<&str> = value
                        .split(',')
                        .map(str::trim)
                        .map(|p| if p == old_id { new_id } else { p })
                        .collect();
                    *value = parts.join(",");
                }
                rewritten += 1;
            }
            rewritten
        })
    }

    /// Drop deleted entries from the record
    pub fn purge_deleted(&self) -> EngineResult<usize> {
        let deleted = self.read(|record| {
            record.resources.values().flatten().count() - record.live_count()
        });
        if deleted == 0 {
            return Ok(0);
        }
        self.mutate(|record| {
            for entries in record.resources.values_mut() {
                entries.retain(|e| e.status.is_live());
            }
            record.resources.retain(|_, entries| !entries.is_empty());
        })?;
        info!(stack = %self.stack(), purged = deleted, "Purged deleted resources");
        Ok(deleted)
    }

    pub fn record_cleanup(&self, cleanup: CleanupRecord) -> EngineResult<()> {
        self.mutate(|record| record.cleanups.push(cleanup))
    }

    pub fn cleanup_history(&self) -> Vec<CleanupRecord> {
        self.read(|record| record.cleanups.clone())
    }

    /// Copy of the full record (for backups)
    pub fn snapshot(&self) -> StackRecord {
        self.read(StackRecord::clone)
    }

    /// Replace the record wholesale (restore). Returns the live count.
    pub fn replace_from(&self, mut incoming: StackRecord) -> EngineResult<usize> {
        if incoming.stack != self.stack() {
            return Err(EngineError::validation(
                "restore",
                format!(
                    "backup belongs to stack '{}', not '{}'",
                    incoming.stack,
                    self.stack()
                ),
            ));
        }
        incoming.migrate();
        let live = incoming.live_count();
        self.mutate(move |record| *record = incoming)?;
        info!(stack = %self.stack(), resources = live, "Replaced registry contents");
        Ok(live)
    }

    pub fn region(&self) -> String {
        self.read(|record| record.region.clone())
    }

    pub fn environment(&self) -> String {
        self.read(|record| record.environment.clone())
    }
}
