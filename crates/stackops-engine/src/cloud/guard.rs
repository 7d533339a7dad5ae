//! Scoped guard for freshly created resources
//!
//! A resource exists at the provider as soon as `create` returns, but the
//! engine only knows about it once the registry write succeeds. The guard
//! covers that window: dropped without `commit()`, it hands the resource to
//! the [`OrphanSweeper`], which deletes it in teardown order.

use super::client::{CloudApi, CreatedResource};
use stackops_common::ResourceKind;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Messages consumed by the sweeper
#[derive(Debug)]
pub enum SweepMessage {
    ResourceDropped {
        kind: ResourceKind,
        id: String,
        stack: String,
    },
    Shutdown,
}

/// Cloneable sender side; creates guards
#[derive(Clone)]
pub struct SweepHandle {
    tx: mpsc::UnboundedSender<SweepMessage>,
}

impl SweepHandle {
    /// Wrap a just-created resource
    pub fn guard(
        &self,
        kind: ResourceKind,
        resource: CreatedResource,
        stack: impl Into<String>,
    ) -> ProvisionGuard {
        ProvisionGuard {
            kind,
            resource,
            stack: stack.into(),
            tx: self.tx.clone(),
            armed: true,
        }
    }

    /// Ask the sweeper to finish pending deletions and stop
    pub fn shutdown(&self) {
        let _ = self.tx.send(SweepMessage::Shutdown);
    }
}

/// Guard that deletes the wrapped resource unless committed
///
/// ```ignore
/// let created = cloud.create(&spec).await?;
/// let guard = sweeper.guard(spec.kind, created, &spec.stack);
///
/// // If the registry write fails, the guard drops and the resource is swept
/// registry.register(spec.kind, &guard.id, guard.metadata.clone())?;
/// let created = guard.commit();
/// ```
pub struct ProvisionGuard {
    kind: ResourceKind,
    resource: CreatedResource,
    stack: String,
    tx: mpsc::UnboundedSender<SweepMessage>,
    armed: bool,
}

impl ProvisionGuard {
    /// The resource is now tracked elsewhere; drop will not delete it.
    pub fn commit(mut self) -> CreatedResource {
        self.armed = false;
        std::mem::take(&mut self.resource)
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl Deref for ProvisionGuard {
    type Target = CreatedResource;

    fn deref(&self) -> &Self::Target {
        &self.resource
    }
}

impl Drop for ProvisionGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!(
                kind = %self.kind,
                id = %self.resource.id,
                stack = %self.stack,
                "Resource dropped before it was recorded, scheduling deletion"
            );
            let _ = self.tx.send(SweepMessage::ResourceDropped {
                kind: self.kind,
                id: std::mem::take(&mut self.resource.id),
                stack: std::mem::take(&mut self.stack),
            });
        }
    }
}

/// Item in the sweep queue with priority
struct SweepItem {
    kind: ResourceKind,
    id: String,
    stack: String,
}

impl PartialEq for SweepItem {
    fn eq(&self, other: &Self) -> bool {
        self.kind.cleanup_priority() == other.kind.cleanup_priority()
    }
}

impl Eq for SweepItem {}

impl PartialOrd for SweepItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SweepItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order: lower priority number = process first
        other
            .kind
            .cleanup_priority()
            .cmp(&self.kind.cleanup_priority())
    }
}

/// Background task deleting resources whose guards were dropped
pub struct OrphanSweeper {
    rx: mpsc::UnboundedReceiver<SweepMessage>,
    cloud: Arc<dyn CloudApi>,
    swept: Arc<AtomicUsize>,
}

impl OrphanSweeper {
    /// Number of resources deleted so far (shared with the caller)
    pub fn swept_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.swept)
    }

    /// Run until a Shutdown message arrives or every handle is dropped
    pub async fn run(mut self) {
        let mut pending: BinaryHeap<SweepItem> = BinaryHeap::new();

        loop {
            tokio::select! {
                msg = self.rx.recv() => {
                    match msg {
                        Some(SweepMessage::ResourceDropped { kind, id, stack }) => {
                            debug!(kind = %kind, id = %id, "Queued for sweep");
                            pending.push(SweepItem { kind, id, stack });
                        }
                        Some(SweepMessage::Shutdown) | None => {
                            info!("Orphan sweeper shutting down");
                            break;
                        }
                    }
                }
                // Batch deletions once the channel goes quiet
                _ = tokio::time::sleep(Duration::from_millis(100)), if !pending.is_empty() => {
                    self.process_pending(&mut pending).await;
                }
            }
        }

        if !pending.is_empty() {
            info!(count = pending.len(), "Processing remaining sweep items");
            self.process_pending(&mut pending).await;
        }
    }

    async fn process_pending(&self, pending: &mut BinaryHeap<SweepItem>) {
        while let Some(item) = pending.pop() {
            match self.cloud.delete(item.kind, &item.id).await {
                Ok(()) => {
                    self.swept.fetch_add(1, AtomicOrdering::Relaxed);
                    info!(
                        kind = %item.kind,
                        id = %item.id,
                        stack = %item.stack,
                        "Deleted untracked resource"
                    );
                }
                Err(e) if e.is_not_found() => {
                    debug!(kind = %item.kind, id = %item.id, "Resource already deleted");
                }
                Err(e) => {
                    warn!(
                        kind = %item.kind,
                        id = %item.id,
                        stack = %item.stack,
                        error = %e,
                        "Failed to delete untracked resource"
                    );
                }
            }
        }
    }
}

/// Create a handle and sweeper pair
///
/// Returns the handle (for creating guards) and the sweeper (to be spawned).
pub fn create_sweeper(cloud: Arc<dyn CloudApi>) -> (SweepHandle, OrphanSweeper) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sweeper = OrphanSweeper {
        rx,
        cloud,
        swept: Arc::new(AtomicUsize::new(0)),
    };
    (SweepHandle { tx }, sweeper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::MockCloudApi;
    use crate::cloud::{CloudApiError, Metadata};
    use mockall::Sequence;
    use mockall::predicate::eq;

    fn created(id: &str) -> CreatedResource {
        CreatedResource {
            id: id.to_string(),
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn test_commit_prevents_sweep() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_delete().never();

        let (handle, sweeper) = create_sweeper(Arc::new(cloud));
        let guard = handle.guard(ResourceKind::Compute, created("i-1"), "web");
        assert_eq!(guard.id, "i-1");
        let resource = guard.commit();
        assert_eq!(resource.id, "i-1");

        handle.shutdown();
        sweeper.run().await;
    }

    #[tokio::test]
    async fn test_dropped_guards_swept_in_teardown_order() {
        let mut cloud = MockCloudApi::new();
        let mut seq = Sequence::new();
        cloud
            .expect_delete()
            .with(eq(ResourceKind::Compute), eq("i-1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        cloud
            .expect_delete()
            .with(eq(ResourceKind::Network), eq("vpc-1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(CloudApiError::not_found("gone")));

        let (handle, sweeper) = create_sweeper(Arc::new(cloud));
        let swept = sweeper.swept_counter();

        drop(handle.guard(ResourceKind::Network, created("vpc-1"), "web"));
        drop(handle.guard(ResourceKind::Compute, created("i-1"), "web"));

        handle.shutdown();
        sweeper.run().await;

        // Only the compute delete succeeded; the network was already gone
        assert_eq!(swept.load(AtomicOrdering::Relaxed), 1);
    }
}
