//! Cloud collaborator contract, error classification and provisioning guard

mod client;
mod error;
mod guard;

pub use client::{
    CloudApi, CreatedResource, Metadata, ResourceDescription, ResourceSpec, is_healthy_state,
};
#[cfg(test)]
pub use client::MockCloudApi;
pub use error::{CloudApiError, CloudErrorKind, classify_cloud_error};
pub use guard::{OrphanSweeper, ProvisionGuard, SweepHandle, create_sweeper};
