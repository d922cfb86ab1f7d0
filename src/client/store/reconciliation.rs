//! # Reconciliation
//!
//! One pure reducer decides what every incoming event does to a store
//! snapshot: bulk loads, results of local mutations, and remote pushes all
//! go through [`reconcile`], which returns the next snapshot together with
//! the notices the change raised.
//!
//! ## Rules
//!
//! - **Validation first**: entities without a server id or with `start >= end`
//!   are rejected with `SyncError::Validation` and never reach the store
//! - **Stale writes**: an event whose `updatedAt` is not newer than the
//!   stored entity is discarded, leaving the snapshot untouched
//! - **Own confirmations**: a server confirmation of a pending mutation
//!   always applies, whatever its timestamp
//! - **Conflicts**: after a change, overlaps are recomputed for the affected
//!   entity's resource; new and cleared pairs are reported as notices
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vcms_sync::client::store::{reconcile, EntityStore, RemotePush, SyncEvent};
//! use vcms_sync::shared::models::BerthAllocation;
//!
//! # fn example(incoming: BerthAllocation) -> Result<(), vcms_sync::shared::SyncError> {
//! let store = EntityStore::<BerthAllocation>::new();
//! let result = reconcile(&store, SyncEvent::RemotePush(RemotePush::Upsert(incoming)), chrono::Utc::now())?;
//! for notice in &result.notices {
//!     println!("{:?}", notice);
//! }
//! # Ok(())
//! # }
//! ```

use super::EntityStore;
use crate::client::sync::conflict_resolver::{conflicts_for, ConflictRecord};
use crate::shared::error::SyncError;
use crate::shared::event::{PushAction, PushMessage};
use crate::shared::models::{validate_entity, validate_shape, Entity, EntityId, EntityKind};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Every input the store reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent<E: Entity> {
    /// A page of entities from the bulk load endpoint
    BulkLoad { entities: Vec<E>, total: u64 },
    /// The local user's change, or the server's answer to it
    LocalMutation(LocalMutation<E>),
    /// A change made elsewhere, reported by the push channel
    RemotePush(RemotePush<E>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocalMutation<E: Entity> {
    /// Optimistic create; the store assigns a temporary id
    Create { draft: E },
    /// Optimistic update
    Update { id: EntityId, changes: E::Changes },
    /// The server accepted the mutation on `id`
    Confirmed { id: EntityId, entity: E },
    /// The server rejected the mutation on `id`
    Rejected {
        id: EntityId,
        original: E::Changes,
        reason: String,
    },
    /// The server deleted `id` at the user's request
    Deleted { id: EntityId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemotePush<E> {
    Upsert(E),
    Delete(EntityId),
}

impl<E: Entity> SyncEvent<E> {
    /// Turn a push message into an event for this collection.
    ///
    /// Messages for another entity type are rejected.
    pub fn from_push(message: &PushMessage) -> Result<Self, SyncError> {
        let kind = message.event_type.entity_kind();
        if kind != E::KIND {
            return Err(SyncError::validation(
                "type",
                format!("{} carries {}, expected {}", message.event_type, kind, E::KIND),
            ));
        }
        Ok(match message.decode::<E>()? {
            PushAction::Upsert(entity) => Self::RemotePush(RemotePush::Upsert(entity)),
            PushAction::Delete(id) => Self::RemotePush(RemotePush::Delete(id)),
        })
    }
}

/// Why an event left the store unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Not newer than what is stored
    Stale,
    /// Target id is not in the collection
    UnknownEntity,
    /// Server answer for an id without a pending mutation
    NoPendingMutation,
}

/// What an event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Loaded { count: usize, total: u64, kept_local: usize },
    Inserted { id: EntityId },
    Replaced { id: EntityId },
    /// Newer server state slid under a pending local change
    Rebased { id: EntityId },
    Optimistic { id: EntityId },
    Created { temp_id: EntityId },
    Confirmed { id: EntityId, temp_id: Option<EntityId> },
    RolledBack { id: EntityId },
    Removed { id: EntityId },
    Discarded { id: Option<EntityId>, reason: DiscardReason },
}

/// Side effects the caller should surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotice {
    ConflictDetected { kind: EntityKind, record: ConflictRecord },
    ConflictCleared { kind: EntityKind, record: ConflictRecord },
    MutationRejected { kind: EntityKind, id: EntityId, reason: String },
}

/// Result of reducing one event
#[derive(Debug, Clone)]
pub struct Reconciliation<E: Entity> {
    pub store: EntityStore<E>,
    pub outcome: Outcome,
    pub notices: Vec<SyncNotice>,
    /// Conflicts in the affected comparison class after the event
    pub conflicts: Vec<ConflictRecord>,
}

impl<E: Entity> Reconciliation<E> {
    /// Whether the event produced a new snapshot
    pub fn changed(&self, before: &EntityStore<E>) -> bool {
        !self.store.same_snapshot(before)
    }
}

/// Reduce one event against `store`
pub fn reconcile<E: Entity>(
    store: &EntityStore<E>,
    event: SyncEvent<E>,
    now: DateTime<Utc>,
) -> Result<Reconciliation<E>, SyncError> {
    match event {
        SyncEvent::BulkLoad { entities, total } => bulk_load(store, entities, total, now),
        SyncEvent::LocalMutation(mutation) => local_mutation(store, mutation, now),
        SyncEvent::RemotePush(RemotePush::Upsert(entity)) => {
            validate_entity(&entity)?;
            Ok(remote_upsert(store, entity))
        }
        SyncEvent::RemotePush(RemotePush::Delete(id)) => {
            validate_id(id)?;
            Ok(remove(store, id))
        }
    }
}

fn validate_id(id: EntityId) -> Result<(), SyncError> {
    if id <= 0 {
        return Err(SyncError::validation("id", format!("invalid entity id {}", id)));
    }
    Ok(())
}

fn bulk_load<E: Entity>(
    store: &EntityStore<E>,
    entities: Vec<E>,
    total: u64,
    now: DateTime<Utc>,
) -> Result<Reconciliation<E>, SyncError> {
    for entity in &entities {
        validate_entity(entity)?;
    }

    let mut kept_local = 0;
    let mut merged: Vec<E> = Vec::with_capacity(entities.len());
    for incoming in entities {
        match store.get(incoming.id()) {
            Some(stored)
                if store.has_pending(incoming.id()) || stored.updated_at() > incoming.updated_at() =>
            {
                kept_local += 1;
                merged.push(stored.clone());
            }
            _ => merged.push(incoming),
        }
    }
    let count = merged.len();
    // Optimistic creates are not on the server yet
    merged.extend(
        store
            .iter()
            .filter(|e| store.pending(e.id()).map_or(false, |p| p.is_create()))
            .cloned(),
    );

    let next = store.set_all(merged, now);
    let before: BTreeSet<_> = store.conflicts().into_iter().collect();
    let after = next.conflicts();
    let notices = conflict_notices::<E>(&before, &after.iter().cloned().collect());
    tracing::debug!(
        "[Store] {} bulk load: {} rows, {} kept local, {} conflicts",
        E::KIND,
        count,
        kept_local,
        after.len()
    );

    Ok(Reconciliation {
        store: next,
        outcome: Outcome::Loaded {
            count,
            total,
            kept_local,
        },
        notices,
        conflicts: after,
    })
}

fn local_mutation<E: Entity>(
    store: &EntityStore<E>,
    mutation: LocalMutation<E>,
    now: DateTime<Utc>,
) -> Result<Reconciliation<E>, SyncError> {
    match mutation {
        LocalMutation::Create { draft } => {
            validate_shape(&draft)?;
            let (next, temp_id) = store.insert_optimistic(draft, now);
            Ok(finish(store, next, temp_id, Outcome::Created { temp_id }))
        }
        LocalMutation::Update { id, changes } => {
            let Some(current) = store.get(id) else {
                return Ok(discarded(store, Some(id), DiscardReason::UnknownEntity));
            };
            if let Some(target) = E::status_change(&changes) {
                if !E::can_transition(current.status(), target) {
                    return Err(SyncError::conflict(format!(
                        "{} {} cannot move from {} to {}",
                        E::KIND,
                        id,
                        current.status(),
                        target
                    )));
                }
            }
            validate_shape(&current.apply_changes(&changes))?;
            let next = store.apply_optimistic(id, changes, now);
            Ok(finish(store, next, id, Outcome::Optimistic { id }))
        }
        LocalMutation::Confirmed { id, entity } => {
            validate_entity(&entity)?;
            if !store.has_pending(id) {
                // Not ours to force; same rules as any other server write
                return Ok(remote_upsert(store, entity));
            }
            let server_id = entity.id();
            let next = store.confirm(id, entity);
            let temp_id = (server_id != id).then_some(id);
            let mut result = finish(store, next, server_id, Outcome::Confirmed { id: server_id, temp_id });
            if let Some(temp_id) = temp_id {
                // Carry conflicts known under the temporary id over to the server id
                let old: BTreeSet<_> = conflicts_for_id(store, server_id)
                    .into_iter()
                    .chain(
                        conflicts_for_id(store, temp_id)
                            .into_iter()
                            .map(|record| record.renamed(temp_id, server_id)),
                    )
                    .collect();
                let current: BTreeSet<_> = result.conflicts.iter().cloned().collect();
                result.notices = conflict_notices::<E>(&old, &current);
            }
            Ok(result)
        }
        LocalMutation::Rejected { id, original, reason } => {
            if !store.has_pending(id) {
                return Ok(discarded(store, Some(id), DiscardReason::NoPendingMutation));
            }
            tracing::warn!("[Store] {} {} rejected by server: {}", E::KIND, id, reason);
            let next = store.rollback(id, &original);
            let mut result = finish(store, next, id, Outcome::RolledBack { id });
            result.notices.push(SyncNotice::MutationRejected {
                kind: E::KIND,
                id,
                reason,
            });
            Ok(result)
        }
        LocalMutation::Deleted { id } => Ok(remove(store, id)),
    }
}

fn remote_upsert<E: Entity>(store: &EntityStore<E>, entity: E) -> Reconciliation<E> {
    let id = entity.id();
    match store.get(id) {
        Some(stored) if entity.updated_at() <= stored.updated_at() => {
            tracing::debug!(
                "[Store] Discarding stale {} {} ({} <= {})",
                E::KIND,
                id,
                entity.updated_at().to_rfc3339(),
                stored.updated_at().to_rfc3339()
            );
            discarded(store, Some(id), DiscardReason::Stale)
        }
        Some(_) if store.has_pending(id) => {
            let next = store.rebase_pending(entity);
            finish(store, next, id, Outcome::Rebased { id })
        }
        Some(_) => {
            let next = store.upsert_one(entity);
            finish(store, next, id, Outcome::Replaced { id })
        }
        None => {
            let next = store.upsert_one(entity);
            finish(store, next, id, Outcome::Inserted { id })
        }
    }
}

fn remove<E: Entity>(store: &EntityStore<E>, id: EntityId) -> Reconciliation<E> {
    if !store.contains(id) {
        return discarded(store, Some(id), DiscardReason::UnknownEntity);
    }
    let before: BTreeSet<_> = conflicts_for_id(store, id).into_iter().collect();
    let notices = conflict_notices::<E>(&before, &BTreeSet::new());
    Reconciliation {
        store: store.remove_one(id),
        outcome: Outcome::Removed { id },
        notices,
        conflicts: Vec::new(),
    }
}

fn discarded<E: Entity>(store: &EntityStore<E>, id: Option<EntityId>, reason: DiscardReason) -> Reconciliation<E> {
    Reconciliation {
        store: store.clone(),
        outcome: Outcome::Discarded { id, reason },
        notices: Vec::new(),
        conflicts: Vec::new(),
    }
}

/// Build the result for a change to `id`, diffing its conflicts before and after
fn finish<E: Entity>(
    before: &EntityStore<E>,
    after: EntityStore<E>,
    id: EntityId,
    outcome: Outcome,
) -> Reconciliation<E> {
    let old: BTreeSet<_> = conflicts_for_id(before, id).into_iter().collect();
    let conflicts = conflicts_for_id(&after, id);
    let notices = conflict_notices::<E>(&old, &conflicts.iter().cloned().collect());
    Reconciliation {
        store: after,
        outcome,
        notices,
        conflicts,
    }
}

fn conflicts_for_id<E: Entity>(store: &EntityStore<E>, id: EntityId) -> Vec<ConflictRecord> {
    match store.get(id) {
        Some(target) => conflicts_for(target, store.iter()),
        None => Vec::new(),
    }
}

fn conflict_notices<E: Entity>(
    before: &BTreeSet<ConflictRecord>,
    after: &BTreeSet<ConflictRecord>,
) -> Vec<SyncNotice> {
    let detected = after.difference(before).map(|record| SyncNotice::ConflictDetected {
        kind: E::KIND,
        record: record.clone(),
    });
    let cleared = before.difference(after).map(|record| SyncNotice::ConflictCleared {
        kind: E::KIND,
        record: record.clone(),
    });
    detected.chain(cleared).collect()
}
