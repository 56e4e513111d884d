//! Reconciliation primitives for the schedule coordinator.
//!
//! The coordinator never stores transition history. After every mutation it
//! observes the queues, and the helpers here turn that observation into the
//! next state:
//!
//! - **Lock reducer**: per-axis lock state derived from a [`SyncObservation`].
//! - **Confirmation table**: optimistic writes waiting for the durable store
//!   to acknowledge them, with per-entity deadlines and exact rollback values.
//! - **Feed cursor**: exactly-once application of confirmation messages.
//!
//! # Invariants
//!
//! - All reductions are pure and deterministic given the same inputs
//! - Expiring a confirmation returns the snapshot captured before the first
//!   unacknowledged write, never an intermediate one
//! - The feed cursor only moves forward

mod confirm;
mod lock;

pub use confirm::{Expired, PendingConfirmations};
pub use lock::{reduce, AxisLock, AxisState, ConvergenceStatus, SyncObservation};

use std::time::Duration;

use cadence_id::Seq;
use thiserror::Error;

/// Reconciliation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// No acknowledgment arrived before the deadline.
    #[error("timeout after {elapsed:?} waiting for {resource}")]
    Timeout { resource: String, elapsed: Duration },

    /// The resource is not being tracked.
    #[error("resource not found: {0}")]
    NotFound(String),
}

impl ReconcileError {
    /// Timeouts are retryable: local state has already been reverted.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Position in the confirmation feed.
///
/// Tracks the last applied message for exactly-once semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCursor {
    /// Last applied message sequence.
    pub last_seq: Seq,

    /// Timestamp of last cursor update.
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl FeedCursor {
    /// Create a cursor positioned at `last_seq`.
    pub fn new(last_seq: Seq) -> Self {
        Self {
            last_seq,
            updated_at: chrono::Utc::now(),
        }
    }

    /// Check if a message has already been applied.
    pub fn is_processed(&self, seq: Seq) -> bool {
        seq <= self.last_seq
    }

    /// Advance the cursor to a new message.
    pub fn advance(&mut self, seq: Seq) {
        if seq > self.last_seq {
            self.last_seq = seq;
            self.updated_at = chrono::Utc::now();
        }
    }
}

impl Default for FeedCursor {
    fn default() -> Self {
        Self::new(Seq::ZERO)
    }
}

/// Default wait for a durable-write acknowledgment.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_cursor() {
        let mut cursor = FeedCursor::new(Seq::new(100));

        assert!(cursor.is_processed(Seq::new(50)));
        assert!(cursor.is_processed(Seq::new(100)));
        assert!(!cursor.is_processed(Seq::new(101)));

        cursor.advance(Seq::new(150));
        assert!(cursor.is_processed(Seq::new(150)));
        assert!(!cursor.is_processed(Seq::new(151)));

        // never moves backwards
        cursor.advance(Seq::new(120));
        assert_eq!(cursor.last_seq, Seq::new(150));
    }

    #[test]
    fn test_feed_cursor_stamps_updates() {
        let mut cursor = FeedCursor::default();
        let created = cursor.updated_at;

        cursor.advance(Seq::new(1));
        assert!(cursor.updated_at >= created);

        let stamped = cursor.updated_at;
        cursor.advance(Seq::new(1));
        assert_eq!(cursor.updated_at, stamped);
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = ReconcileError::Timeout {
            resource: "eng_x".into(),
            elapsed: Duration::from_secs(5),
        };
        assert!(err.is_retryable());
        assert!(!ReconcileError::NotFound("eng_x".into()).is_retryable());
        assert_eq!(err.to_string(), "timeout after 5s waiting for eng_x");
    }
}
