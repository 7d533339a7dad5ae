//! Resource tag constants for discovery and cleanup
//!
//! Every resource created through the engine carries these tags so that an
//! operator can find what a stack owns even when the local registry is lost.

/// Tag key holding the owning stack name
pub const TAG_STACK: &str = "stackops:stack";

/// Tag key holding the deployment environment
pub const TAG_ENVIRONMENT: &str = "stackops:environment";

/// Tag key marking the resource as engine-managed
pub const TAG_MANAGED_BY: &str = "stackops:managed-by";

/// Value for [`TAG_MANAGED_BY`]
pub const TAG_MANAGED_BY_VALUE: &str = "stackops";

/// Tag key holding the creation timestamp (RFC 3339)
pub const TAG_CREATED_AT: &str = "stackops:created-at";
