//! Shared test utilities for stackops
//!
//! Used by the engine's integration tests. Nothing here talks to a real
//! provider.
//!
//! ## Modules
//!
//! - [`cloud`]: in-memory [`CloudApi`](stackops_engine::CloudApi) with failure injection
//! - [`state`]: temporary state directories and unique stack names

pub mod cloud;
pub mod state;

pub use cloud::{FakeCloud, FakeOp};
pub use state::{TestState, test_stack_name};
