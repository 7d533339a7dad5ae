//! Resource types and teardown ordering
//!
//! Provides one cleanup order shared by every teardown path (orchestrated
//! cleanup, the orphan sweeper, dry-run planning). Resources must be deleted
//! dependents-first or the provider rejects the call.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Types of cloud resources that make up a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// CDN distribution in front of the load balancer
    Cdn,
    /// Load balancer routing to compute
    LoadBalancer,
    /// Shared file storage mounted by compute
    SharedStorage,
    /// Compute service / instances
    Compute,
    /// Security groups and policies
    Security,
    /// Network (VPC, subnets)
    Network,
}

impl ResourceKind {
    /// All kinds, in teardown order.
    pub const CLEANUP_ORDER: [ResourceKind; 6] = [
        ResourceKind::Cdn,
        ResourceKind::LoadBalancer,
        ResourceKind::SharedStorage,
        ResourceKind::Compute,
        ResourceKind::Security,
        ResourceKind::Network,
    ];

    /// Get cleanup priority (lower number = cleanup first)
    ///
    /// - 0: CDN (fronts the load balancer)
    /// - 1: Load balancer (targets compute, attached to security and network)
    /// - 2: Shared storage (mount targets live in the network)
    /// - 3: Compute (uses security groups and subnets)
    /// - 4: Security (referenced by everything above)
    /// - 5: Network (must be empty to delete)
    pub fn cleanup_priority(self) -> u8 {
        match self {
            ResourceKind::Cdn => 0,
            ResourceKind::LoadBalancer => 1,
            ResourceKind::SharedStorage => 2,
            ResourceKind::Compute => 3,
            ResourceKind::Security => 4,
            ResourceKind::Network => 5,
        }
    }

    /// Kinds this kind needs to exist while it is alive.
    pub fn depends_on(self) -> &'static [ResourceKind] {
        use ResourceKind::*;
        match self {
            Cdn => &[LoadBalancer],
            LoadBalancer => &[Compute, Security, Network],
            SharedStorage => &[Security, Network],
            Compute => &[Security, Network],
            Security => &[Network],
            Network => &[],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Cdn => "cdn",
            ResourceKind::LoadBalancer => "load-balancer",
            ResourceKind::SharedStorage => "shared-storage",
            ResourceKind::Compute => "compute",
            ResourceKind::Security => "security",
            ResourceKind::Network => "network",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown resource kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource kind '{0}' (expected one of: cdn, load-balancer, shared-storage, compute, security, network)")]
pub struct UnknownResourceKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownResourceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::CLEANUP_ORDER
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownResourceKind(s.to_string()))
    }
}
