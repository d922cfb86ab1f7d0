//! Property-based tests for the entity store

use crate::common::{allocation, at};
use proptest::prelude::*;
use std::collections::HashSet;
use vcms_sync::client::store::{reconcile, RemotePush, SyncEvent};
use vcms_sync::client::EntityStore;
use vcms_sync::shared::models::BerthAllocation;

proptest! {
    #[test]
    fn test_upserts_keep_ids_unique(ops in prop::collection::vec((1i64..20, 1u32..20), 0..60)) {
        let mut store: EntityStore<BerthAllocation> = EntityStore::new();
        let mut first_seen = Vec::new();
        for (id, hour) in ops {
            let mut entity = allocation(id, 1, 0, 1);
            entity.updated_at = at(hour);
            if !first_seen.contains(&id) {
                first_seen.push(id);
            }
            store = store.upsert_one(entity);
        }

        prop_assert_eq!(store.len(), store.ids().len());
        let unique: HashSet<_> = store.ids().iter().collect();
        prop_assert_eq!(unique.len(), store.ids().len());
        prop_assert_eq!(store.ids(), first_seen.as_slice());
        prop_assert!(store.is_consistent());
    }

    #[test]
    fn test_stale_push_never_changes_snapshot(stored_hour in 1u32..23, delta in 0u32..23) {
        let incoming_hour = stored_hour.saturating_sub(delta);
        let mut stored = allocation(1, 1, 2, 3);
        stored.updated_at = at(stored_hour);
        let store = EntityStore::new().upsert_one(stored);

        let mut incoming = allocation(1, 1, 4, 9);
        incoming.updated_at = at(incoming_hour);
        let result = reconcile(&store, SyncEvent::RemotePush(RemotePush::Upsert(incoming)), at(23)).unwrap();

        prop_assert!(result.store.same_snapshot(&store));
    }
}
