//! Per-resource confirmation for manual cleanups

use crate::registry::Resource;

/// Decides whether a resource may be deleted in manual mode
pub trait Confirm: Send + Sync {
    fn confirm(&self, resource: &Resource) -> bool;
}

/// Approves everything
#[derive(Debug, Default)]
pub struct AlwaysConfirm;

impl Confirm for AlwaysConfirm {
    fn confirm(&self, _resource: &Resource) -> bool {
        true
    }
}

/// Approves nothing; manual cleanups skip every resource unless forced
#[derive(Debug, Default)]
pub struct NeverConfirm;

impl Confirm for NeverConfirm {
    fn confirm(&self, _resource: &Resource) -> bool {
        false
    }
}

impl<F> Confirm for F
where
    F: Fn(&Resource) -> bool + Send + Sync,
{
    fn confirm(&self, resource: &Resource) -> bool {
        self(resource)
    }
}
