//! # Scheduled Callbacks
//!
//! Timer bookkeeping for backoff, heartbeat and debounce. Callers register
//! a key with a delay and get a token back; `fire_due` hands back every key
//! whose deadline has passed on the scheduler's clock. The owner decides
//! how to wait (a `tokio::time::sleep_until` on `next_deadline`, or a
//! manual clock in tests).
//!
//! ## Features
//!
//! - **Cancellable**: any timer can be cancelled by token
//! - **Ordered**: due timers fire in deadline order, ties in registration order
//! - **Clock-agnostic**: time comes from a [`Clock`], so tests can drive it

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of monotonic time
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;
}

/// Tokio's clock; follows `tokio::time::pause`/`advance` in tests
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

/// Handle to a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

/// Timer registry keyed by deadline
#[derive(Debug)]
pub struct Scheduler<K> {
    clock: Arc<dyn Clock>,
    next_seq: u64,
    /// (deadline, registration sequence) -> key
    timers: BTreeMap<(Instant, u64), K>,
}

impl<K: Clone + Debug> Scheduler<K> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            next_seq: 0,
            timers: BTreeMap::new(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Register `key` to fire after `delay`
    pub fn schedule(&mut self, delay: Duration, key: K) -> TimerToken {
        let seq = self.next_seq;
        self.next_seq += 1;
        let deadline = self.clock.now() + delay;
        self.timers.insert((deadline, seq), key);
        TimerToken(seq)
    }

    /// Cancel a timer; returns false if it already fired or was cancelled
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        let found = self
            .timers
            .keys()
            .find(|(_, seq)| *seq == token.0)
            .copied();
        match found {
            Some(slot) => self.timers.remove(&slot).is_some(),
            None => false,
        }
    }

    /// Cancel every timer whose key matches
    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let before = self.timers.len();
        self.timers.retain(|_, key| !predicate(key));
        before - self.timers.len()
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Time left until the earliest timer, zero if already due
    pub fn time_until_next(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Remove and return every due key in firing order
    pub fn fire_due(&mut self) -> Vec<K> {
        let now = self.clock.now();
        let mut fired = Vec::new();
        while let Some((&(deadline, seq), _)) = self.timers.iter().next() {
            if deadline > now {
                break;
            }
            if let Some(key) = self.timers.remove(&(deadline, seq)) {
                fired.push(key);
            }
        }
        fired
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    pub fn is_scheduled(&self, mut predicate: impl FnMut(&K) -> bool) -> bool {
        self.timers.values().any(|key| predicate(key))
    }
}

/// Quiet-period filter: only the last value submitted before `delay` of
/// silence is released.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    clock: Arc<dyn Clock>,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            delay,
            clock,
            pending: None,
        }
    }

    /// Submit a value, superseding any value still waiting
    pub fn push(&mut self, value: T) {
        let deadline = self.clock.now() + self.delay;
        self.pending = Some((deadline, value));
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    /// Release the waiting value if its quiet period has elapsed
    pub fn poll(&mut self) -> Option<T> {
        let now = self.clock.now();
        match &self.pending {
            Some((deadline, _)) if *deadline <= now => self.pending.take().map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
