/**
 * Push Event Types
 *
 * This module defines the typed messages carried by the push channel.
 * Every message has the shape `{type, payload, timestamp, id}`; the
 * payload is the full entity (or `{id}` for deletions) of the entity type
 * named by `type`.
 */
use crate::shared::error::SyncError;
use crate::shared::models::{EntityId, EntityKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of push event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PushEventType {
    /// A vessel call changed
    VesselUpdate,
    /// A berth allocation changed
    BerthChange,
    /// A service booking changed status
    ServiceStatus,
    /// A clearance changed
    ClearanceUpdate,
}

impl PushEventType {
    /// Entity type whose records this event carries
    pub fn entity_kind(self) -> EntityKind {
        match self {
            Self::VesselUpdate => EntityKind::VesselCall,
            Self::BerthChange => EntityKind::BerthAllocation,
            Self::ServiceStatus => EntityKind::ServiceBooking,
            Self::ClearanceUpdate => EntityKind::Clearance,
        }
    }

    /// Event type used to push records of `kind`
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::VesselCall => Self::VesselUpdate,
            EntityKind::BerthAllocation => Self::BerthChange,
            EntityKind::ServiceBooking => Self::ServiceStatus,
            EntityKind::Clearance => Self::ClearanceUpdate,
        }
    }
}

impl fmt::Display for PushEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::VesselUpdate => "VESSEL_UPDATE",
            Self::BerthChange => "BERTH_CHANGE",
            Self::ServiceStatus => "SERVICE_STATUS",
            Self::ClearanceUpdate => "CLEARANCE_UPDATE",
        };
        f.write_str(label)
    }
}

/// Message delivered by the push channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushMessage {
    /// Type of event
    #[serde(rename = "type")]
    pub event_type: PushEventType,
    /// Event payload
    pub payload: serde_json::Value,
    /// When the server emitted the event
    pub timestamp: DateTime<Utc>,
    /// Server-assigned message id
    pub id: String,
}

/// What a push message asks the store to do
#[derive(Debug, Clone, PartialEq)]
pub enum PushAction<E> {
    Upsert(E),
    Delete(EntityId),
}

impl PushMessage {
    /// Create a new push message with a fresh id
    pub fn new(event_type: PushEventType, payload: serde_json::Value) -> Self {
        Self {
            event_type,
            payload,
            timestamp: Utc::now(),
            id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Create a deletion message for `id`
    pub fn deletion(event_type: PushEventType, id: EntityId) -> Self {
        Self::new(event_type, serde_json::json!({ "id": id, "deleted": true }))
    }

    /// Decode the payload as an entity of type `E`.
    ///
    /// A payload of the form `{"id": n, "deleted": true}` decodes to a
    /// deletion.
    pub fn decode<E: serde::de::DeserializeOwned>(&self) -> Result<PushAction<E>, SyncError> {
        let deleted = self
            .payload
            .get("deleted")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if deleted {
            let id = self
                .payload
                .get("id")
                .and_then(|v| v.as_i64())
                .ok_or_else(|| SyncError::validation("id", "deletion without an id"))?;
            return Ok(PushAction::Delete(id));
        }
        if self.payload.get("id").map_or(true, |v| v.is_null()) {
            return Err(SyncError::validation(
                "id",
                format!("{} payload without an id", self.event_type),
            ));
        }
        let entity = serde_json::from_value(self.payload.clone())?;
        Ok(PushAction::Upsert(entity))
    }
}
