//! Shared test utilities for metagen integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring an orchestrator and override controller to a
//!   scripted generation service and an in-memory session store
//! - Builders for product records and spreadsheet bytes

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::*;
