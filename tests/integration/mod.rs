//! Integration tests against the public API

pub mod api_test;
pub mod config_test;
pub mod connection_test;
pub mod context_test;
pub mod store_test;
