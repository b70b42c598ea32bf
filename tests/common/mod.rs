//! Common test utilities for token-sweep end-to-end tests

#[allow(dead_code)]
pub mod fixtures;

pub use fixtures::*;
