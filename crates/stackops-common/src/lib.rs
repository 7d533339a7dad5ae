//! stackops-common - Shared types and utilities
//!
//! Plain types shared by the engine and its test helpers. No async runtime.
//!
//! ## Modules
//!
//! - [`defaults`]: Default configuration values
//! - [`resource_kind`]: Resource types and teardown ordering
//! - [`stats`]: Sample statistics (min/avg/max)
//! - [`tags`]: Resource tag constants for discovery and cleanup
//! - [`validate`]: Stack name and region validation

pub mod defaults;
pub mod resource_kind;
pub mod stats;
pub mod tags;
pub mod validate;

// Re-export commonly used types
pub use resource_kind::ResourceKind;
pub use stats::{RunningStats, SampleStats};
pub use validate::{InputError, validate_region, validate_stack_name};

