//! In-memory cloud provider
//!
//! Ids are `{kind}-{n}`. Every call is recorded, and errors can be queued
//! per operation to simulate throttling or outages.

use async_trait::async_trait;
use stackops_common::ResourceKind;
use stackops_engine::cloud::{
    CloudApi, CloudApiError, CreatedResource, Metadata, ResourceDescription, ResourceSpec,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Which call an injected error applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    Create,
    Describe,
    Delete,
}

#[derive(Debug, Clone)]
struct FakeResource {
    kind: ResourceKind,
    state: String,
    metadata: Metadata,
}

#[derive(Default)]
struct FakeState {
    resources: HashMap<String, FakeResource>,
    next_id: u64,
    creates: Vec<ResourceSpec>,
    describes: Vec<(ResourceKind, String)>,
    deletes: Vec<(ResourceKind, String)>,
    failures: HashMap<FakeOp, VecDeque<CloudApiError>>,
}

/// In-memory [`CloudApi`]
#[derive(Default)]
pub struct FakeCloud {
    state: Mutex<FakeState>,
    latency: Option<Duration>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Add an existing resource in the `available` state
    pub fn seed(&self, kind: ResourceKind, id: &str) {
        self.lock().resources.insert(
            id.to_string(),
            FakeResource {
                kind,
                state: "available".to_string(),
                metadata: Metadata::new(),
            },
        );
    }

    /// Forget a resource, as if it was deleted out of band
    pub fn mark_missing(&self, id: &str) {
        self.lock().resources.remove(id);
    }

    pub fn set_state(&self, id: &str, state: &str) {
        if let Some(resource) = self.lock().resources.get_mut(id) {
            resource.state = state.to_string();
        }
    }

    pub fn set_metadata(&self, id: &str, key: &str, value: &str) {
        if let Some(resource) = self.lock().resources.get_mut(id) {
            resource.metadata.insert(key.to_string(), value.to_string());
        }
    }

    /// Queue errors returned by the next calls of `op`, in order
    pub fn fail_next(&self, op: FakeOp, errors: impl IntoIterator<Item = CloudApiError>) {
        self.lock().failures.entry(op).or_default().extend(errors);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().resources.contains_key(id)
    }

    pub fn resource_count(&self) -> usize {
        self.lock().resources.len()
    }

    pub fn create_calls(&self) -> Vec<ResourceSpec> {
        self.lock().creates.clone()
    }

    pub fn describe_calls(&self) -> Vec<(ResourceKind, String)> {
        self.lock().describes.clone()
    }

    /// Deletes in the order they were issued
    pub fn delete_calls(&self) -> Vec<(ResourceKind, String)> {
        self.lock().deletes.clone()
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn injected(&self, op: FakeOp) -> Option<CloudApiError> {
        self.lock().failures.get_mut(&op).and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl CloudApi for FakeCloud {
    async fn create(&self, spec: &ResourceSpec) -> Result<CreatedResource, CloudApiError> {
        self.pause().await;
        let mut state = self.lock();
        state.creates.push(spec.clone());
        if let Some(err) = state.failures.get_mut(&FakeOp::Create).and_then(VecDeque::pop_front) {
            return Err(err);
        }

        state.next_id += 1;
        let id = format!("{}-{}", spec.kind, state.next_id);
        let metadata = Metadata::from([("zone".to_string(), format!("{}a", spec.region))]);
        state.resources.insert(
            id.clone(),
            FakeResource {
                kind: spec.kind,
                state: "available".to_string(),
                metadata: metadata.clone(),
            },
        );
        Ok(CreatedResource { id, metadata })
    }

    async fn describe(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> Result<ResourceDescription, CloudApiError> {
        self.pause().await;
        self.lock().describes.push((kind, id.to_string()));
        if let Some(err) = self.injected(FakeOp::Describe) {
            return Err(err);
        }

        match self.lock().resources.get(id) {
            Some(resource) if resource.kind == kind => Ok(ResourceDescription {
                id: id.to_string(),
                kind,
                state: resource.state.clone(),
                metadata: resource.metadata.clone(),
            }),
            _ => Err(CloudApiError::not_found(format!("{kind} '{id}' does not exist"))),
        }
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), CloudApiError> {
        self.pause().await;
        self.lock().deletes.push((kind, id.to_string()));
        if let Some(err) = self.injected(FakeOp::Delete) {
            return Err(err);
        }

        match self.lock().resources.remove(id) {
            Some(_) => Ok(()),
            None => Err(CloudApiError::not_found(format!("{kind} '{id}' does not exist"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_describe_delete() {
        let cloud = FakeCloud::new();
        let spec = ResourceSpec::new(ResourceKind::Network, "web", "us-east-1", "dev");
        let created = cloud.create(&spec).await.unwrap();
        assert_eq!(created.id, "network-1");

        let desc = cloud.describe(ResourceKind::Network, "network-1").await.unwrap();
        assert!(desc.is_healthy());

        cloud.delete(ResourceKind::Network, "network-1").await.unwrap();
        let err = cloud.delete(ResourceKind::Network, "network-1").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(cloud.delete_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_in_order() {
        let cloud = FakeCloud::new();
        cloud.seed(ResourceKind::Cdn, "d-1");
        cloud.fail_next(
            FakeOp::Describe,
            [CloudApiError::throttled("slow down"), CloudApiError::fatal("boom")],
        );

        let first = cloud.describe(ResourceKind::Cdn, "d-1").await.unwrap_err();
        assert!(first.is_retryable());
        let second = cloud.describe(ResourceKind::Cdn, "d-1").await.unwrap_err();
        assert!(!second.is_retryable());
        cloud.describe(ResourceKind::Cdn, "d-1").await.unwrap();
    }
}
