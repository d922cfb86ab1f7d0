//! Property-based tests for reconnect backoff

use proptest::prelude::*;
use std::time::Duration;
use vcms_sync::client::connection::{BackoffPolicy, RetryDecision};

proptest! {
    #[test]
    fn test_delays_double(base_ms in 1u64..10_000, max_attempts in 1u32..12) {
        let policy = BackoffPolicy::new(Duration::from_millis(base_ms), max_attempts);
        let schedule = policy.schedule();

        prop_assert_eq!(schedule.len(), max_attempts as usize);
        prop_assert_eq!(schedule[0], Duration::from_millis(base_ms));
        for pair in schedule.windows(2) {
            prop_assert_eq!(pair[1], pair[0] * 2);
        }
    }

    #[test]
    fn test_gives_up_exactly_at_cap(max_attempts in 0u32..20, spent in 0u32..40) {
        let policy = BackoffPolicy::new(Duration::from_millis(1000), max_attempts);
        match policy.decide(spent) {
            RetryDecision::GiveUp => prop_assert!(spent >= max_attempts),
            RetryDecision::RetryAfter { attempt, delay } => {
                prop_assert!(spent < max_attempts);
                prop_assert_eq!(attempt, spent + 1);
                prop_assert_eq!(delay, policy.delay_for(attempt));
            }
        }
    }
}
