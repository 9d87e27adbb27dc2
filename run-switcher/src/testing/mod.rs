//! Testing utilities for the run switcher.
//!
//! This module provides:
//! - An in-memory API client with per-key holds
//! - Entity fixtures and sample templates
//! - Assertions over presentations

mod assertions;
pub mod fixtures;
mod mocks;

pub use assertions::{assert_gated, assert_mode, assert_mutual_exclusion, assert_template_source};
pub use mocks::InMemoryApiClient;
