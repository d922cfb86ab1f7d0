//! Berth allocations: a vessel call occupying a berth for a time window.

use super::{entity_changes, Entity, EntityId, EntityKind, ResourceKey, TimeRange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a berth allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BerthAllocationStatus {
    /// Allocated, vessel not yet alongside
    Scheduled,
    /// Vessel currently at berth
    Occupied,
    Completed,
    Cancelled,
}

impl fmt::Display for BerthAllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Scheduled => "SCHEDULED",
            Self::Occupied => "OCCUPIED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

/// A berth allocation as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BerthAllocation {
    pub id: EntityId,
    pub vessel_call_id: i64,
    pub vessel_name: String,
    pub berth_id: i64,
    pub berth_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BerthAllocationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

entity_changes!(BerthAllocation, BerthAllocationChanges {
    vessel_call_id: i64,
    vessel_name: String,
    berth_id: i64,
    berth_name: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: BerthAllocationStatus,
});

impl Entity for BerthAllocation {
    type Status = BerthAllocationStatus;
    type Changes = BerthAllocationChanges;

    const KIND: EntityKind = EntityKind::BerthAllocation;

    fn id(&self) -> EntityId {
        self.id
    }

    fn status(&self) -> Self::Status {
        self.status
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn apply_changes(&self, changes: &Self::Changes) -> Self {
        let mut next = self.clone();
        changes.merge_into(&mut next);
        next
    }

    fn capture_fields(&self, changes: &Self::Changes) -> Self::Changes {
        changes.capture(self)
    }

    fn status_change(changes: &Self::Changes) -> Option<Self::Status> {
        changes.status
    }

    fn with_id(&self, id: EntityId) -> Self {
        Self { id, ..self.clone() }
    }

    fn time_range(&self) -> Option<TimeRange> {
        Some(TimeRange::new(self.start_time, self.end_time))
    }

    fn resource_key(&self) -> Option<ResourceKey> {
        Some(ResourceKey::Berth(self.berth_id))
    }

    fn can_transition(from: Self::Status, to: Self::Status) -> bool {
        use BerthAllocationStatus::*;
        match (from, to) {
            (a, b) if a == b => true,
            (Scheduled, Occupied | Cancelled) => true,
            (Occupied, Completed) => true,
            _ => false,
        }
    }
}
