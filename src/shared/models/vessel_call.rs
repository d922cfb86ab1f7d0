//! Vessel calls: one visit of a vessel to the port.

use super::{entity_changes, Entity, EntityId, EntityKind, TimeRange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VesselCallStatus {
    Planned,
    Arrived,
    AtBerth,
    Departed,
    Cancelled,
}

impl fmt::Display for VesselCallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Planned => "PLANNED",
            Self::Arrived => "ARRIVED",
            Self::AtBerth => "AT_BERTH",
            Self::Departed => "DEPARTED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VesselCall {
    pub id: EntityId,
    pub vessel_id: i64,
    pub vessel_name: String,
    pub imo_number: String,
    pub call_sign: String,
    pub status: VesselCallStatus,
    /// Estimated time of arrival
    pub eta: DateTime<Utc>,
    /// Estimated time of departure
    pub etd: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ata: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atd: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

entity_changes!(VesselCall, VesselCallChanges {
    vessel_id: i64,
    vessel_name: String,
    imo_number: String,
    call_sign: String,
    status: VesselCallStatus,
    eta: DateTime<Utc>,
    etd: DateTime<Utc>,
    ata: Option<DateTime<Utc>>,
    atd: Option<DateTime<Utc>>,
});

impl Entity for VesselCall {
    type Status = VesselCallStatus;
    type Changes = VesselCallChanges;

    const KIND: EntityKind = EntityKind::VesselCall;

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
        Some(TimeRange::new(self.eta, self.etd))
    }
}
