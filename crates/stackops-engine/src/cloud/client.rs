//! Cloud API collaborator contract
//!
//! The engine never talks to a provider SDK directly. Callers inject an
//! implementation of [`CloudApi`]; unit tests use the generated mock.

use super::error::CloudApiError;
use async_trait::async_trait;
use chrono::Utc;
use stackops_common::ResourceKind;
use stackops_common::tags::{
    TAG_CREATED_AT, TAG_ENVIRONMENT, TAG_MANAGED_BY, TAG_MANAGED_BY_VALUE, TAG_STACK,
};
use std::collections::BTreeMap;

/// Opaque string key-value metadata attached to a resource
pub type Metadata = BTreeMap<String, String>;

/// Desired resource handed to [`CloudApi::create`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    pub kind: ResourceKind,
    pub stack: String,
    pub region: String,
    pub environment: String,
    pub properties: Metadata,
}

impl ResourceSpec {
    pub fn new(
        kind: ResourceKind,
        stack: impl Into<String>,
        region: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            stack: stack.into(),
            region: region.into(),
            environment: environment.into(),
            properties: Metadata::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: Metadata) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Ownership tags every created resource must carry
    pub fn tags(&self) -> Metadata {
        Metadata::from([
            (TAG_STACK.to_string(), self.stack.clone()),
            (TAG_ENVIRONMENT.to_string(), self.environment.clone()),
            (TAG_MANAGED_BY.to_string(), TAG_MANAGED_BY_VALUE.to_string()),
            (TAG_CREATED_AT.to_string(), Utc::now().to_rfc3339()),
        ])
    }
}

/// Result of a confirmed create
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatedResource {
    pub id: String,
    pub metadata: Metadata,
}

/// Live state of a resource as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescription {
    pub id: String,
    pub kind: ResourceKind,
    pub state: String,
    pub metadata: Metadata,
}

/// Provider states treated as healthy
const HEALTHY_STATES: &[&str] = &["available", "active", "running", "deployed", "in-service"];

/// Check a provider state string against the healthy set
pub fn is_healthy_state(state: &str) -> bool {
    HEALTHY_STATES.contains(&state)
}

impl ResourceDescription {
    pub fn is_healthy(&self) -> bool {
        is_healthy_state(&self.state)
    }
}

/// Create / describe / delete per resource type.
///
/// Implementations classify provider failures into [`CloudApiError`]
/// (see [`classify_cloud_error`](super::classify_cloud_error)). Deleting a
/// resource that does not exist must return a not-found error, which the
/// engine treats as success.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn create(&self, spec: &ResourceSpec) -> Result<CreatedResource, CloudApiError>;

    async fn describe(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> Result<ResourceDescription, CloudApiError>;

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), CloudApiError>;
}
