//! Shared test utilities for docflow integration tests.
//!
//! This module provides:
//! - Fake analysis and text-analytics services
//! - `TestHarness` wiring a pipeline to an in-memory or file-backed database
//! - Builders for file records and config JSON

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::*;
pub use harness::TestHarness;
