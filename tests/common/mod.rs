//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - Entity and page fixtures
//! - Scripted channel and manual clock wiring
//! - Log setup
//! - Custom assertion macros

#[macro_use]
pub mod assertions;
pub mod fixtures;
pub mod logging;

// Re-export commonly used utilities
pub use fixtures::*;
pub use logging::init_tracing;
