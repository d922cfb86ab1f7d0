//! Clearances and their approval workflow.

use super::{entity_changes, Entity, EntityId, EntityKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClearanceType {
    Customs,
    Immigration,
    PortAuthority,
    Health,
    Security,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClearanceStatus {
    Pending,
    InProgress,
    Approved,
    Rejected,
    Cancelled,
}

impl ClearanceStatus {
    /// Statuses a user may move a clearance to from `self`
    pub fn allowed_next(self) -> &'static [ClearanceStatus] {
        use ClearanceStatus::*;
        match self {
            Pending => &[InProgress, Cancelled],
            InProgress => &[Approved, Rejected],
            Rejected => &[InProgress],
            Approved => &[InProgress],
            Cancelled => &[Pending],
        }
    }
}

impl fmt::Display for ClearanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clearance {
    pub id: EntityId,
    pub vessel_call_id: i64,
    pub vessel_name: String,
    #[serde(rename = "type")]
    pub clearance_type: ClearanceType,
    pub status: ClearanceStatus,
    pub reference_number: String,
    pub submitted_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

entity_changes!(Clearance, ClearanceChanges {
    vessel_call_id: i64,
    vessel_name: String,
    status: ClearanceStatus,
    reference_number: String,
    submitted_by: String,
    approved_by: Option<String>,
    remarks: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
});

impl Entity for Clearance {
    type Status = ClearanceStatus;
    type Changes = ClearanceChanges;

    const KIND: EntityKind = EntityKind::Clearance;

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

    fn can_transition(from: Self::Status, to: Self::Status) -> bool {
        from == to || from.allowed_next().contains(&to)
    }
}
