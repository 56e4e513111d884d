//! Timer table for optimistic writes awaiting acknowledgment.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::time::{Duration, Instant};

use crate::ReconcileError;

#[derive(Debug, Clone)]
struct Pending<S> {
    snapshot: S,
    started_at: Instant,
    deadline: Instant,
}

/// A confirmation that ran out of time.
#[derive(Debug, Clone, PartialEq)]
pub struct Expired<K, S> {
    pub key: K,

    /// Values captured before the first unacknowledged write.
    pub snapshot: S,

    pub elapsed: Duration,
}

impl<K: Display, S> Expired<K, S> {
    /// The retryable failure reported to the caller.
    pub fn error(&self) -> ReconcileError {
        ReconcileError::Timeout {
            resource: self.key.to_string(),
            elapsed: self.elapsed,
        }
    }
}

/// Optimistic writes keyed by entity, each with a rollback snapshot and a
/// deadline.
///
/// Entries are independent: acknowledging or expiring one never touches
/// another.
#[derive(Debug, Clone)]
pub struct PendingConfirmations<K, S> {
    /// How long an entity may stay unconfirmed.
    timeout: Duration,

    /// Tracked writes: key -> (snapshot, started, deadline).
    pending: BTreeMap<K, Pending<S>>,
}

impl<K: Ord + Clone, S> PendingConfirmations<K, S> {
    /// Create an empty table with the given per-entity timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pending: BTreeMap::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start (or restart) the wait for `key`.
    ///
    /// If `key` is already confirming, its original snapshot is kept and only
    /// the deadline moves, so a rollback always restores the pre-optimistic
    /// values. Returns true if this started a new entry.
    pub fn begin(&mut self, key: K, snapshot: S, now: Instant) -> bool {
        let deadline = now + self.timeout;
        match self.pending.get_mut(&key) {
            Some(entry) => {
                entry.deadline = deadline;
                false
            }
            None => {
                self.pending.insert(
                    key,
                    Pending {
                        snapshot,
                        started_at: now,
                        deadline,
                    },
                );
                true
            }
        }
    }

    /// Clear the marker for `key`, keeping the optimistic state.
    ///
    /// Returns the discarded snapshot, or `None` if `key` was not confirming.
    pub fn acknowledge(&mut self, key: &K) -> Option<S> {
        self.pending.remove(key).map(|entry| entry.snapshot)
    }

    /// Drop `key` without acknowledging it (the entity no longer exists).
    pub fn forget(&mut self, key: &K) -> Result<S, ReconcileError>
    where
        K: Display,
    {
        self.pending
            .remove(key)
            .map(|entry| entry.snapshot)
            .ok_or_else(|| ReconcileError::NotFound(key.to_string()))
    }

    /// Remove and return every entry whose deadline is at or before `now`.
    pub fn expire(&mut self, now: Instant) -> Vec<Expired<K, S>> {
        let due: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();

        due.into_iter()
            .filter_map(|key| {
                let entry = self.pending.remove(&key)?;
                Some(Expired {
                    elapsed: now.duration_since(entry.started_at),
                    snapshot: entry.snapshot,
                    key,
                })
            })
            .collect()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Earliest deadline among pending entries, for callers that sleep until
    /// the next expiry.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|entry| entry.deadline).min()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.pending.keys()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
