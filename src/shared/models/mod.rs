//! Domain entities
//!
//! Every record kept in a live collection implements [`Entity`]. The trait
//! exposes what the store and the reconciliation policy need: identity,
//! status, timestamps, a partial-change type, and (where relevant) the time
//! range and shared resource used for conflict detection.

pub mod berth_allocation;
pub mod clearance;
pub mod service_booking;
pub mod vessel_call;

pub use berth_allocation::{BerthAllocation, BerthAllocationChanges, BerthAllocationStatus};
pub use clearance::{Clearance, ClearanceChanges, ClearanceStatus, ClearanceType};
pub use service_booking::{ServiceBooking, ServiceBookingChanges, ServiceStatus, ServiceType};
pub use vessel_call::{VesselCall, VesselCallChanges, VesselCallStatus};

use crate::shared::error::SyncError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};
use std::str::FromStr;

/// Entity identifier. Server ids are positive; optimistic creates use
/// temporary negative ids until confirmed.
pub type EntityId = i64;

/// Entity types known to the synchronization layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    VesselCall,
    BerthAllocation,
    Clearance,
    ServiceBooking,
}

impl EntityKind {
    /// REST collection path segment
    pub fn resource_path(self) -> &'static str {
        match self {
            Self::VesselCall => "vessel-calls",
            Self::BerthAllocation => "berth-allocations",
            Self::Clearance => "clearances",
            Self::ServiceBooking => "service-bookings",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource_path())
    }
}

impl FromStr for EntityKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vessel-calls" | "VESSEL_CALL" => Ok(Self::VesselCall),
            "berth-allocations" | "BERTH_ALLOCATION" => Ok(Self::BerthAllocation),
            "clearances" | "CLEARANCE" => Ok(Self::Clearance),
            "service-bookings" | "SERVICE_BOOKING" => Ok(Self::ServiceBooking),
            other => Err(SyncError::validation(
                "entityType",
                format!("unknown entity type '{}'", other),
            )),
        }
    }
}

/// Half-open time interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Strict intersection; ranges that only share an endpoint do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn is_well_formed(&self) -> bool {
        self.start < self.end
    }
}

/// Shared resource whose time ranges must not overlap
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKey {
    Berth(i64),
}

impl Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Berth(id) => write!(f, "berth:{}", id),
        }
    }
}

/// A record tracked by a live collection
pub trait Entity: Clone + PartialEq + Debug + Serialize + DeserializeOwned + 'static {
    /// Closed status enumeration of this entity type
    type Status: Copy + Eq + Debug + Display;
    /// Partial field set used by updates and rollbacks
    type Changes: Clone + Debug + Default + PartialEq + Serialize + DeserializeOwned;

    const KIND: EntityKind;

    fn id(&self) -> EntityId;
    fn status(&self) -> Self::Status;
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;

    /// Copy of `self` with `changes` merged in
    fn apply_changes(&self, changes: &Self::Changes) -> Self;

    /// Current values of exactly the fields `changes` touches
    fn capture_fields(&self, changes: &Self::Changes) -> Self::Changes;

    /// Status the change set would move the entity to, if any
    fn status_change(changes: &Self::Changes) -> Option<Self::Status>;

    /// Replace the id; used when a temporary id is confirmed
    fn with_id(&self, id: EntityId) -> Self;

    fn time_range(&self) -> Option<TimeRange> {
        None
    }

    fn resource_key(&self) -> Option<ResourceKey> {
        None
    }

    /// Whether a user may move an entity from `from` to `to`
    fn can_transition(_from: Self::Status, _to: Self::Status) -> bool {
        true
    }
}

/// Structural checks applied to every entity that arrives from the server
pub fn validate_entity<E: Entity>(entity: &E) -> Result<(), SyncError> {
    if entity.id() <= 0 {
        return Err(SyncError::validation(
            "id",
            format!("{} record has no server id ({})", E::KIND, entity.id()),
        ));
    }
    validate_shape(entity)
}

/// Checks that hold for local drafts as well as server records
pub fn validate_shape<E: Entity>(entity: &E) -> Result<(), SyncError> {
    if let Some(range) = entity.time_range() {
        if !range.is_well_formed() {
            return Err(SyncError::validation(
                "timeRange",
                format!(
                    "{} {}: start {} is not before end {}",
                    E::KIND,
                    entity.id(),
                    range.start.to_rfc3339(),
                    range.end.to_rfc3339()
                ),
            ));
        }
    }
    Ok(())
}

/// Generates the partial-change struct of an entity: every field optional,
/// camelCase on the wire, absent fields left untouched.
macro_rules! entity_changes {
    ($entity:ident, $changes:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $changes {
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl $changes {
            pub fn is_empty(&self) -> bool {
                true $( && self.$field.is_none() )*
            }

            pub(crate) fn merge_into(&self, target: &mut $entity) {
                $(
                    if let Some(value) = &self.$field {
                        target.$field = value.clone();
                    }
                )*
            }

            pub(crate) fn capture(&self, source: &$entity) -> Self {
                Self {
                    $( $field: self.$field.as_ref().map(|_| source.$field.clone()), )*
                }
            }
        }
    };
}

pub(crate) use entity_changes;
