//! Shared test utilities for catalog-sync integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated test execution with temp directories
//! - Builders for manifest trees and local git fixture repositories

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{fs_source, git_options, git_source, TestHarness};
