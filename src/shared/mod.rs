//! Shared Module
//!
//! This module contains the types that describe the outside world of the
//! synchronization layer: domain entities, push-channel events, REST
//! envelopes, configuration, and the error type.
//!
//! # Overview
//!
//! Nothing in here owns mutable state or touches the network. All types
//! are designed for serialization as camelCase JSON.

/// Domain entities and the `Entity` trait
pub mod models;

/// Push channel events
pub mod event;

/// REST envelopes and query parameters
pub mod api;

/// Shared error types
pub mod error;

/// Synchronization configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use api::{ApiPaginatedResponse, ApiResponse, PageRequest};
pub use config::{ConfigError, SyncConfig, SyncConfigBuilder};
pub use error::SyncError;
pub use event::{PushAction, PushEventType, PushMessage};
pub use models::{Entity, EntityId, EntityKind, ResourceKey, TimeRange};
