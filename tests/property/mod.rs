//! Property-based tests

pub mod backoff_proptest;
pub mod conflict_proptest;
pub mod store_proptest;
