//! # Entity Store
//!
//! A normalized collection of one entity type: an id-to-entity map plus
//! the display order of ids, and the pending mutations for those ids.
//!
//! Every operation returns a new snapshot and leaves `self` untouched.
//! Operations that change nothing hand back the same snapshot, which
//! [`EntityStore::same_snapshot`] detects by pointer comparison.
//!
//! ## Invariants
//!
//! - Every id in the order has an entry in the map, and vice versa
//! - Each id appears in the order exactly once
//! - At most one pending mutation per id, and only for ids in the map

pub mod optimistic;
pub mod reconciliation;

pub use optimistic::{MutationKind, PendingMutation};
pub use reconciliation::{
    reconcile, DiscardReason, LocalMutation, Outcome, Reconciliation, RemotePush, SyncEvent,
    SyncNotice,
};

use crate::client::sync::conflict_resolver::{detect_conflicts, ConflictRecord};
use crate::shared::models::{Entity, EntityId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
struct StoreState<E: Entity> {
    entities: HashMap<EntityId, E>,
    ids: Vec<EntityId>,
    pending: HashMap<EntityId, PendingMutation<E>>,
    last_updated: Option<DateTime<Utc>>,
    next_temp_id: EntityId,
}

impl<E: Entity> Default for StoreState<E> {
    fn default() -> Self {
        Self {
            entities: HashMap::new(),
            ids: Vec::new(),
            pending: HashMap::new(),
            last_updated: None,
            next_temp_id: -1,
        }
    }
}

/// Immutable snapshot of one entity collection
pub struct EntityStore<E: Entity> {
    state: Arc<StoreState<E>>,
}

impl<E: Entity> Clone for EntityStore<E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<E: Entity> Default for EntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> fmt::Debug for EntityStore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStore")
            .field("kind", &E::KIND)
            .field("ids", &self.state.ids)
            .field("pending", &self.state.pending.len())
            .field("last_updated", &self.state.last_updated)
            .finish()
    }
}

impl<E: Entity> EntityStore<E> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(StoreState::default()),
        }
    }

    fn derive(&self, edit: impl FnOnce(&mut StoreState<E>)) -> Self {
        let mut next = (*self.state).clone();
        edit(&mut next);
        Self {
            state: Arc::new(next),
        }
    }

    // ---- reads ----

    pub fn get(&self, id: EntityId) -> Option<&E> {
        self.state.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.state.entities.contains_key(&id)
    }

    /// Ids in display order
    pub fn ids(&self) -> &[EntityId] {
        &self.state.ids
    }

    /// Entities in display order
    pub fn iter(&self) -> impl Iterator<Item = &E> + '_ {
        self.state
            .ids
            .iter()
            .filter_map(move |id| self.state.entities.get(id))
    }

    pub fn len(&self) -> usize {
        self.state.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.ids.is_empty()
    }

    pub fn pending(&self, id: EntityId) -> Option<&PendingMutation<E>> {
        self.state.pending.get(&id)
    }

    pub fn has_pending(&self, id: EntityId) -> bool {
        self.state.pending.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.state.pending.len()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.state.last_updated
    }

    /// Whether both handles point at the same snapshot
    pub fn same_snapshot(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Every conflicting pair in the collection
    pub fn conflicts(&self) -> Vec<ConflictRecord> {
        detect_conflicts(self.iter())
    }

    /// Whether the map and the order agree
    pub fn is_consistent(&self) -> bool {
        let state = &self.state;
        let mut seen = std::collections::HashSet::with_capacity(state.ids.len());
        state.ids.len() == state.entities.len()
            && state.ids.iter().all(|id| seen.insert(*id) && state.entities.contains_key(id))
            && state.pending.keys().all(|id| state.entities.contains_key(id))
    }

    // ---- operations ----

    /// Replace the whole collection after a bulk load
    pub fn set_all(&self, entities: Vec<E>, now: DateTime<Utc>) -> Self {
        self.derive(|state| {
            let mut map = HashMap::with_capacity(entities.len());
            let mut ids = Vec::with_capacity(entities.len());
            for entity in entities {
                let id = entity.id();
                if map.insert(id, entity).is_none() {
                    ids.push(id);
                }
            }
            state.pending.retain(|id, _| map.contains_key(id));
            state.entities = map;
            state.ids = ids;
            state.last_updated = Some(now);
        })
    }

    /// Insert or replace; new ids go to the end, existing ids keep their place
    pub fn upsert_one(&self, entity: E) -> Self {
        if self.get(entity.id()) == Some(&entity) {
            return self.clone();
        }
        self.derive(|state| {
            let id = entity.id();
            if state.entities.insert(id, entity).is_none() {
                state.ids.push(id);
            }
        })
    }

    /// Merge `changes` into the entity at `id` ahead of the server.
    ///
    /// No-op for an unknown id. A second call before resolution replaces the
    /// target changes and keeps the first snapshot for rollback.
    pub fn apply_optimistic(&self, id: EntityId, changes: E::Changes, now: DateTime<Utc>) -> Self {
        let Some(current) = self.get(id) else {
            return self.clone();
        };
        let updated = current.apply_changes(&changes);
        // Changes on top of an optimistic create stay a create
        let pending = match self.pending(id) {
            Some(existing) => existing.supersede(changes, now),
            None => PendingMutation::update(current.clone(), changes, now),
        };
        self.derive(|state| {
            state.entities.insert(id, updated);
            state.pending.insert(id, pending);
        })
    }

    /// Insert a draft under the next temporary id
    pub fn insert_optimistic(&self, draft: E, now: DateTime<Utc>) -> (Self, EntityId) {
        let temp_id = self.state.next_temp_id;
        let next = self.derive(|state| {
            state.entities.insert(temp_id, draft.with_id(temp_id));
            state.ids.push(temp_id);
            state.pending.insert(temp_id, PendingMutation::create(temp_id, now));
            state.next_temp_id -= 1;
        });
        (next, temp_id)
    }

    /// Install the authoritative entity for `id` and discard its pending mutation.
    ///
    /// When `id` is a temporary id the server entity takes over its position
    /// under the server-assigned id.
    pub fn confirm(&self, id: EntityId, server_entity: E) -> Self {
        let server_id = server_entity.id();
        if server_id == id {
            return self.derive(|state| {
                state.pending.remove(&id);
                if state.entities.insert(id, server_entity).is_none() {
                    state.ids.push(id);
                }
            });
        }
        self.derive(|state| {
            state.pending.remove(&id);
            let had_temp = state.entities.remove(&id).is_some();
            let server_known = state.entities.contains_key(&server_id);
            match state.ids.iter().position(|x| *x == id) {
                Some(pos) if had_temp && !server_known => state.ids[pos] = server_id,
                Some(pos) => {
                    state.ids.remove(pos);
                    if !server_known {
                        state.ids.push(server_id);
                    }
                }
                None if !server_known => state.ids.push(server_id),
                None => {}
            }
            state.entities.insert(server_id, server_entity);
        })
    }

    /// Undo an optimistic change after the server rejected it.
    ///
    /// The entity returns to its pre-mutation snapshot with `original_fields`
    /// applied on top; a rejected create disappears.
    pub fn rollback(&self, id: EntityId, original_fields: &E::Changes) -> Self {
        let Some(current) = self.get(id) else {
            return self.clone();
        };
        match self.pending(id) {
            Some(pending) if pending.is_create() => self.remove_one(id),
            Some(pending) => {
                let base = pending.original.clone().unwrap_or_else(|| current.clone());
                let restored = base.apply_changes(original_fields);
                self.derive(|state| {
                    state.pending.remove(&id);
                    state.entities.insert(id, restored);
                })
            }
            None => {
                let restored = current.apply_changes(original_fields);
                if &restored == current {
                    return self.clone();
                }
                self.derive(|state| {
                    state.entities.insert(id, restored);
                })
            }
        }
    }

    /// Delete an entity and its pending mutation; no-op if absent
    pub fn remove_one(&self, id: EntityId) -> Self {
        if !self.contains(id) {
            return self.clone();
        }
        self.derive(|state| {
            state.entities.remove(&id);
            state.ids.retain(|x| *x != id);
            state.pending.remove(&id);
        })
    }

    /// A newer server version arrived under a pending update: it becomes the
    /// rollback base and the local changes are re-applied on top of it.
    pub(crate) fn rebase_pending(&self, server_entity: E) -> Self {
        let id = server_entity.id();
        let Some(pending) = self.pending(id) else {
            return self.upsert_one(server_entity);
        };
        let visible = server_entity.apply_changes(&pending.changes);
        let rebased = PendingMutation {
            original: Some(server_entity),
            ..pending.clone()
        };
        self.derive(|state| {
            state.entities.insert(id, visible);
            state.pending.insert(id, rebased);
        })
    }
}
