//! Marine service bookings (pilotage, towage, mooring).

use super::{entity_changes, Entity, EntityId, EntityKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    Pilotage,
    Tugboat,
    Mooring,
    Unmooring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Requested,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Requested => "REQUESTED",
            Self::Confirmed => "CONFIRMED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBooking {
    pub id: EntityId,
    pub vessel_call_id: i64,
    pub vessel_name: String,
    pub service_type: ServiceType,
    pub status: ServiceStatus,
    pub quantity: u32,
    pub service_time: DateTime<Utc>,
    #[serde(default)]
    pub remarks: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

entity_changes!(ServiceBooking, ServiceBookingChanges {
    vessel_call_id: i64,
    vessel_name: String,
    service_type: ServiceType,
    status: ServiceStatus,
    quantity: u32,
    service_time: DateTime<Utc>,
    remarks: String,
});

impl Entity for ServiceBooking {
    type Status = ServiceStatus;
    type Changes = ServiceBookingChanges;

    const KIND: EntityKind = EntityKind::ServiceBooking;

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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remarks_default_to_empty() {
        let json = serde_json::json!({
            "id": 9,
            "vesselCallId": 2,
            "vesselName": "Baltic Wind",
            "serviceType": "TUGBOAT",
            "status": "REQUESTED",
            "quantity": 2,
            "serviceTime": "2024-03-01T08:00:00Z",
            "createdAt": "2024-03-01T07:00:00Z",
            "updatedAt": "2024-03-01T07:00:00Z"
        });
        let booking: ServiceBooking = serde_json::from_value(json).unwrap();
        assert_eq!(booking.service_type, ServiceType::Tugboat);
        assert_eq!(booking.quantity, 2);
        assert!(booking.remarks.is_empty());
        assert!(booking.time_range().is_none());
    }
}
