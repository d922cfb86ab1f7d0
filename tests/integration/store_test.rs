//! End-to-end reconciliation scenarios on the entity store

use crate::common::{allocation, at, clearance};
use pretty_assertions::assert_eq;
use vcms_sync::client::store::{reconcile, DiscardReason, Outcome, RemotePush, SyncEvent, SyncNotice};
use vcms_sync::client::sync::ConflictReason;
use vcms_sync::client::EntityStore;
use vcms_sync::shared::models::{BerthAllocation, ClearanceChanges, ClearanceStatus};
use vcms_sync::shared::ResourceKey;

fn push(entity: BerthAllocation) -> SyncEvent<BerthAllocation> {
    SyncEvent::RemotePush(RemotePush::Upsert(entity))
}

#[test]
fn test_overlapping_allocations_conflict_until_shifted() {
    let store = EntityStore::new();
    let loaded = reconcile(
        &store,
        SyncEvent::BulkLoad {
            entities: vec![allocation(1, 1, 8, 16), allocation(2, 1, 10, 18)],
            total: 2,
        },
        at(7),
    )
    .unwrap();

    assert_eq!(loaded.conflicts.len(), 1);
    let record = &loaded.conflicts[0];
    assert_eq!((record.a, record.b), (1, 2));
    assert_eq!(
        record.reason,
        ConflictReason::TimeOverlap {
            resource: ResourceKey::Berth(1)
        }
    );
    assert!(matches!(loaded.notices.as_slice(), [SyncNotice::ConflictDetected { .. }]));

    let mut shifted = allocation(2, 1, 16, 20);
    shifted.updated_at = at(9);
    let result = reconcile(&loaded.store, push(shifted), at(9)).unwrap();

    assert_eq!(result.outcome, Outcome::Replaced { id: 2 });
    assert!(result.store.conflicts().is_empty());
    assert!(matches!(result.notices.as_slice(), [SyncNotice::ConflictCleared { .. }]));
}

#[test]
fn test_other_berth_never_conflicts() {
    let store = EntityStore::new()
        .upsert_one(allocation(1, 1, 8, 16))
        .upsert_one(allocation(2, 2, 8, 16));
    assert!(store.conflicts().is_empty());
}

#[test]
fn test_rollback_restores_server_status() {
    let store = EntityStore::new().upsert_one(clearance(5, ClearanceStatus::Pending));
    let changes = ClearanceChanges {
        status: Some(ClearanceStatus::Approved),
        ..Default::default()
    };

    let optimistic = store.apply_optimistic(5, changes, at(2));
    assert_eq!(optimistic.get(5).unwrap().status, ClearanceStatus::Approved);
    assert!(optimistic.has_pending(5));

    let rolled_back = optimistic.rollback(
        5,
        &ClearanceChanges {
            status: Some(ClearanceStatus::Pending),
            ..Default::default()
        },
    );
    assert_eq!(rolled_back.get(5).unwrap().status, ClearanceStatus::Pending);
    assert!(!rolled_back.has_pending(5));
    assert_eq!(rolled_back.pending_count(), 0);
}

#[test]
fn test_stale_push_keeps_snapshot() {
    let mut current = allocation(1, 1, 8, 16);
    current.updated_at = at(5);
    let store = EntityStore::new().upsert_one(current);

    let mut older = allocation(1, 1, 9, 17);
    older.updated_at = at(4);
    let result = reconcile(&store, push(older), at(6)).unwrap();

    assert_eq!(
        result.outcome,
        Outcome::Discarded {
            id: Some(1),
            reason: DiscardReason::Stale
        }
    );
    assert!(result.store.same_snapshot(&store));
}

#[test]
fn test_upsert_preserves_order() {
    let store = EntityStore::new()
        .upsert_one(allocation(3, 1, 1, 2))
        .upsert_one(allocation(1, 1, 3, 4))
        .upsert_one(allocation(2, 1, 5, 6));

    let mut changed = allocation(1, 1, 3, 5);
    changed.updated_at = at(9);
    let store = store.upsert_one(changed);

    assert_eq!(store.ids(), &[3, 1, 2]);
    assert!(store.is_consistent());
}
