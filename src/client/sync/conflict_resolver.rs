//! # Conflict Detection
//!
//! Finds pairs of entities that claim the same resource for intersecting
//! time ranges. Conflicts are derived from a collection snapshot every time
//! they are asked for; nothing here is stored on the entities.
//!
//! ## Rules
//!
//! - Only entities sharing a [`ResourceKey`] are compared
//! - Ranges are half-open, so back-to-back ranges do not conflict
//! - Each pair is reported once, lower id first

use crate::shared::models::{Entity, EntityId, ResourceKey};
use serde::Serialize;
use std::collections::BTreeMap;

/// Why two entities conflict
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ConflictReason {
    /// Time ranges intersect on a shared resource
    TimeOverlap { resource: ResourceKey },
}

/// A pair of conflicting entities, `a < b`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConflictRecord {
    pub a: EntityId,
    pub b: EntityId,
    pub reason: ConflictReason,
}

impl ConflictRecord {
    fn overlap(x: EntityId, y: EntityId, resource: ResourceKey) -> Self {
        let (a, b) = if x < y { (x, y) } else { (y, x) };
        Self {
            a,
            b,
            reason: ConflictReason::TimeOverlap { resource },
        }
    }

    pub fn involves(&self, id: EntityId) -> bool {
        self.a == id || self.b == id
    }

    /// The same pair with `from` replaced by `to`
    pub fn renamed(&self, from: EntityId, to: EntityId) -> Self {
        let swap = |id: EntityId| if id == from { to } else { id };
        let ConflictReason::TimeOverlap { resource } = &self.reason;
        Self::overlap(swap(self.a), swap(self.b), resource.clone())
    }
}

/// Whether `left` and `right` conflict
pub fn conflicts_with<E: Entity>(left: &E, right: &E) -> Option<ConflictRecord> {
    if left.id() == right.id() {
        return None;
    }
    let resource = left.resource_key()?;
    if right.resource_key().as_ref() != Some(&resource) {
        return None;
    }
    let (l, r) = (left.time_range()?, right.time_range()?);
    l.overlaps(&r)
        .then(|| ConflictRecord::overlap(left.id(), right.id(), resource))
}

/// All conflicting pairs in `entities`, sorted
pub fn detect_conflicts<'a, E, I>(entities: I) -> Vec<ConflictRecord>
where
    E: Entity,
    I: IntoIterator<Item = &'a E>,
{
    let mut groups: BTreeMap<ResourceKey, Vec<&E>> = BTreeMap::new();
    for entity in entities {
        if let Some(key) = entity.resource_key() {
            groups.entry(key).or_default().push(entity);
        }
    }

    let mut records = Vec::new();
    for members in groups.values() {
        for (i, left) in members.iter().enumerate() {
            for right in &members[i + 1..] {
                if let Some(record) = conflicts_with(*left, *right) {
                    records.push(record);
                }
            }
        }
    }
    records.sort();
    records.dedup();
    records
}

/// Conflicts involving `target`, checked against its comparison class only
pub fn conflicts_for<'a, E, I>(target: &E, entities: I) -> Vec<ConflictRecord>
where
    E: Entity,
    I: IntoIterator<Item = &'a E>,
{
    let mut records: Vec<_> = entities
        .into_iter()
        .filter_map(|other| conflicts_with(target, other))
        .collect();
    records.sort();
    records.dedup();
    records
}
