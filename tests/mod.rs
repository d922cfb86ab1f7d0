//! Test suite for vcms-sync
//!
//! This module organizes all tests

#[macro_use]
pub mod common;
pub mod integration;
pub mod property;
