//! # Pending Mutations
//!
//! Bookkeeping for local changes applied before the server has answered.
//! At most one record exists per entity id. A second change to the same id
//! replaces the target changes but keeps the snapshot taken before the
//! first change, so a rollback always returns to the server's last word.

use crate::shared::models::{Entity, EntityId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Kind of local change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
}

/// An in-flight local change
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation<E: Entity> {
    /// Target id; negative for a not-yet-created entity
    pub id: EntityId,
    pub kind: MutationKind,
    /// Latest requested changes (last writer wins)
    pub changes: E::Changes,
    /// Entity as it was before the first optimistic change; `None` for creates
    pub original: Option<E>,
    pub applied_at: DateTime<Utc>,
}

impl<E: Entity> PendingMutation<E> {
    pub fn update(original: E, changes: E::Changes, applied_at: DateTime<Utc>) -> Self {
        Self {
            id: original.id(),
            kind: MutationKind::Update,
            changes,
            original: Some(original),
            applied_at,
        }
    }

    pub fn create(temp_id: EntityId, applied_at: DateTime<Utc>) -> Self {
        Self {
            id: temp_id,
            kind: MutationKind::Create,
            changes: E::Changes::default(),
            original: None,
            applied_at,
        }
    }

    /// Replace the target changes, keeping the original snapshot
    pub fn supersede(&self, changes: E::Changes, applied_at: DateTime<Utc>) -> Self {
        Self {
            changes,
            applied_at,
            ..self.clone()
        }
    }

    pub fn is_create(&self) -> bool {
        self.kind == MutationKind::Create
    }
}
