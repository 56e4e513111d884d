//! Optimistic writes: time sources and rollback snapshots.
//!
//! The coordinator applies an edit locally, records the engagement's previous
//! fields in a [`PendingConfirmations`](cadence_reconcile::PendingConfirmations)
//! table, and waits for the durable store to acknowledge it. Deadlines are
//! measured against a [`Clock`] so the whole path can be driven in tests
//! without sleeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cadence_id::InstructorId;

use crate::engagement::EngagementFields;

/// Monotonic time source for confirmation deadlines.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// What a timed-out write puts back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rollback {
    pub instructor_id: InstructorId,
    pub fields: EngagementFields,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let other = clock.clone();
        let start = clock.now();

        other.advance(Duration::from_secs(3));
        assert_eq!(clock.now() - start, Duration::from_secs(3));
    }
}
