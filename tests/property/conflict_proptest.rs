//! Property-based tests for conflict detection

use crate::common::{allocation, at};
use proptest::prelude::*;
use vcms_sync::client::sync::{conflicts_with, detect_conflicts};
use vcms_sync::shared::TimeRange;

fn window() -> impl Strategy<Value = (u32, u32)> {
    (0u32..23).prop_flat_map(|start| (Just(start), (start + 1)..=23))
}

proptest! {
    #[test]
    fn test_overlap_formula(a in window(), b in window()) {
        let left = TimeRange::new(at(a.0), at(a.1));
        let right = TimeRange::new(at(b.0), at(b.1));
        let expected = a.0 < b.1 && b.0 < a.1;
        prop_assert_eq!(left.overlaps(&right), expected);
        prop_assert_eq!(right.overlaps(&left), expected);
    }

    #[test]
    fn test_pairs_are_ordered_and_share_a_berth(
        windows in prop::collection::vec((window(), 1i64..4), 0..12)
    ) {
        let allocations: Vec<_> = windows
            .iter()
            .enumerate()
            .map(|(i, ((start, end), berth))| allocation(i as i64 + 1, *berth, *start, *end))
            .collect();
        let records = detect_conflicts(allocations.iter());

        for record in &records {
            prop_assert!(record.a < record.b);
            let a = &allocations[(record.a - 1) as usize];
            let b = &allocations[(record.b - 1) as usize];
            prop_assert_eq!(a.berth_id, b.berth_id);
            prop_assert!(conflicts_with(a, b).is_some());
        }

        let mut expected = 0;
        for (i, a) in allocations.iter().enumerate() {
            for b in &allocations[i + 1..] {
                if conflicts_with(a, b).is_some() {
                    expected += 1;
                }
            }
        }
        prop_assert_eq!(records.len(), expected);
    }
}
