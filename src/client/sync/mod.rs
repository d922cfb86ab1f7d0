//! # Sync Support
//!
//! Building blocks shared by the connection manager and the live
//! collections:
//!
//! - **Scheduler**: cancellable timers and the debouncer, driven by a [`Clock`]
//! - **Conflict Resolver**: derived overlap detection on shared resources

pub mod conflict_resolver;
pub mod scheduler;

pub use conflict_resolver::{conflicts_for, conflicts_with, detect_conflicts, ConflictReason, ConflictRecord};
pub use scheduler::{Clock, Debouncer, ManualClock, Scheduler, SystemClock, TimerToken};
