//! Durable ledger of provisioned resources per stack
//!
//! One [`ResourceRegistry`] instance serves one stack. Every mutation is
//! applied to a copy of the record, persisted, and only then made visible,
//! all under a single lock, so writes for a resource are linearized and a
//! failed write leaves both disk and memory unchanged.

mod crud;
mod store;
mod types;

pub use store::{StackStore, read_record, write_atomic};
pub use types::{
    CleanupRecord, Resource, ResourceEntry, ResourceStatus, SCHEMA_VERSION, StackRecord,
};

use crate::error::{EngineError, EngineResult};
use std::sync::{Arc, Mutex, MutexGuard};

/// Handle to a stack's registry. Cheap to clone.
#[derive(Clone)]
pub struct ResourceRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    stack: String,
    store: StackStore,
    record: Mutex<StackRecord>,
}

impl ResourceRegistry {
    /// Open the registry for `stack`, loading its record or starting a new one.
    pub fn open(
        store: StackStore,
        stack: &str,
        region: &str,
        environment: &str,
    ) -> EngineResult<Self> {
        let record = match store.load(stack) {
            Ok(Some(record)) => record,
            Ok(None) => StackRecord::new(stack, region, environment),
            Err(e) => return Err(registry_error(stack, &e)),
        };

        tracing::debug!(
            stack = %stack,
            resources = record.live_count(),
            path = %store.path_for(stack).display(),
            "Opened registry"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                stack: stack.to_string(),
                store,
                record: Mutex::new(record),
            }),
        })
    }

    pub fn stack(&self) -> &str {
        &self.inner.stack
    }

    pub fn store(&self) -> &StackStore {
        &self.inner.store
    }

    fn lock(&self) -> MutexGuard<'_, StackRecord> {
        self.inner
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read-only access to the current record
    fn read<R>(&self, f: impl FnOnce(&StackRecord) -> R) -> R {
        f(&self.lock())
    }

    /// Apply `f` to a copy of the record, persist it, then publish it.
    fn mutate<R>(&self, f: impl FnOnce(&mut StackRecord) -> R) -> EngineResult<R> {
        let mut current = self.lock();
        let mut next = current.clone();
        let out = f(&mut next);
        self.inner
            .store
            .save(&next)
            .map_err(|e| registry_error(&self.inner.stack, &e))?;
        *current = next;
        Ok(out)
    }
}

pub(crate) fn registry_error(stack: &str, err: &anyhow::Error) -> EngineError {
    EngineError::Registry {
        stack: stack.to_string(),
        reason: format!("{err:#}"),
    }
}
