//! VCMS Sync - Live Entity Synchronization
//!
//! Client-side synchronization layer of the Vessel Call Management System.
//! It keeps normalized collections of port operations records (vessel calls,
//! berth allocations, clearances, service bookings) consistent while three
//! sources change them at once: paginated bulk loads from the REST API,
//! optimistic mutations by the local user, and pushes from the real-time
//! channel reporting changes made by other clients.
//!
//! # Module Structure
//!
//! - **`shared`** - Platform-agnostic types
//!   - Domain entities and the `Entity` trait
//!   - Push events and REST envelopes
//!   - Configuration and error types
//!
//! - **`client`** - Synchronization machinery
//!   - Connection manager with heartbeat and exponential reconnect
//!   - Immutable entity store and the reconciliation reducer
//!   - Conflict detection on shared berths
//!   - Notification center with de-duplication and serial delivery
//!   - Live collections and the `SyncContext`
//!
//! # Usage
//!
//! ```rust,no_run
//! use vcms_sync::client::SyncContext;
//! use vcms_sync::shared::{PageRequest, SyncConfig};
//! use vcms_sync::shared::models::Clearance;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::load()?;
//! let mut context = SyncContext::new(config)?;
//! let clearances = context.collection::<Clearance>();
//!
//! context.connect().await?;
//! context.bind("entity-updates", &clearances).await?;
//! context.load(&clearances, &PageRequest::new(0, 20)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! The client is single-threaded by construction: shared state lives in
//! `Rc<RefCell<_>>`, and every event is applied to a store one at a time.
//! Run it on a current-thread runtime or inside a `tokio::task::LocalSet`.
//!
//! # Error Handling
//!
//! Every fallible operation returns `Result<T, SyncError>`; see
//! [`shared::error`] for the taxonomy. Transport failures are absorbed by the
//! reconnect logic and only surface as connection state changes until the
//! retry budget runs out.

/// Shared types and data structures
pub mod shared;

/// Live synchronization client
pub mod client;
