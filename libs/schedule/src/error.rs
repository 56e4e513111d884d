//! Error taxonomy for schedule operations.
//!
//! Every failure is local to one operation. Validation and policy failures are
//! raised before any state changes; confirmation timeouts are raised after
//! local state has already been rolled back.

use cadence_id::{EngagementId, InstructorId};
use cadence_reconcile::ReconcileError;
use thiserror::Error;

use crate::engagement::EngagementStatus;
use crate::time::{to_hhmm, DayBounds};
use crate::Axis;

/// Result type for schedule operations.
pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Which bucket of the taxonomy an error falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed or out-of-range input. No state change.
    Validation,
    /// Refused by a scheduling rule. No state change.
    Policy,
    /// An optimistic write was not acknowledged in time and was reverted.
    ConfirmationTimeout,
    /// The upstream feed disagrees with local state.
    FeedInconsistency,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorClass::Validation => "validation",
            ErrorClass::Policy => "policy",
            ErrorClass::ConfirmationTimeout => "confirmation timeout",
            ErrorClass::FeedInconsistency => "feed inconsistency",
        };
        f.write_str(s)
    }
}

/// Errors that can occur in schedule operations.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid time '{0}': expected HH:MM")]
    InvalidTime(String),

    #[error("{} is outside the operating day {bounds}", fmt_minute(*.minute))]
    OutOfBounds { minute: i64, bounds: DayBounds },

    #[error("location '{0}' is not in the allowed vocabulary")]
    LocationNotAllowed(String),

    #[error("required gap cannot be negative (got {0})")]
    InvalidRequiredGap(i64),

    #[error("engagement {0} has zero duration")]
    ZeroDuration(EngagementId),

    #[error("invalid compensation rate: {0}")]
    InvalidRate(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown instructor: {0}")]
    UnknownInstructor(InstructorId),

    #[error("unknown engagement: {0}")]
    UnknownEngagement(EngagementId),

    #[error("queue for {0} is inactive")]
    QueueInactive(InstructorId),

    #[error("queue for {0} is held")]
    QueueHeld(InstructorId),

    #[error("{0} axis is locked")]
    AxisLocked(Axis),

    #[error("no proposed {0} to apply")]
    NoProposal(Axis),

    #[error("engagement {0} is completed and cannot be edited")]
    CompletedImmutable(EngagementId),

    #[error("engagement {engagement_id} cannot move from {from} back to {to}")]
    StatusRegression {
        engagement_id: EngagementId,
        from: EngagementStatus,
        to: EngagementStatus,
    },

    #[error("another engagement already starts at {} for {instructor_id}", to_hhmm(*.start))]
    DuplicateStart { instructor_id: InstructorId, start: u32 },

    #[error("engagement {0} is already queued")]
    DuplicateEngagement(EngagementId),

    #[error("shift would reorder {instructor_id}'s queue around completed engagements")]
    OrderViolation { instructor_id: InstructorId },

    #[error("shift would move {instructor_id}'s engagement to {}, outside the operating day {bounds}", fmt_minute(*.minute))]
    ShiftOutOfBounds {
        instructor_id: InstructorId,
        minute: i64,
        bounds: DayBounds,
    },

    #[error("engagement {engagement_id} exceeds {what} capacity ({used} > {capacity})")]
    CapacityExceeded {
        engagement_id: EngagementId,
        what: &'static str,
        used: usize,
        capacity: u32,
    },

    #[error("engagement {engagement_id} belongs to {actual}, not {expected}")]
    WrongQueue {
        engagement_id: EngagementId,
        expected: String,
        actual: String,
    },

    #[error("write to {engagement_id} was not confirmed and has been reverted")]
    ConfirmationTimeout {
        engagement_id: EngagementId,
        #[source]
        source: ReconcileError,
    },

    #[error("feed inconsistency: {0}")]
    FeedInconsistency(String),

    #[error("malformed feed: {0}")]
    MalformedFeed(#[from] serde_json::Error),
}

fn fmt_minute(minute: i64) -> String {
    if (0..crate::time::MINUTES_PER_DAY as i64).contains(&minute) {
        to_hhmm(minute as u32)
    } else {
        format!("minute {minute}")
    }
}

impl ScheduleError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ScheduleError::InvalidTime(_)
            | ScheduleError::OutOfBounds { .. }
            | ScheduleError::LocationNotAllowed(_)
            | ScheduleError::InvalidRequiredGap(_)
            | ScheduleError::ZeroDuration(_)
            | ScheduleError::InvalidRate(_)
            | ScheduleError::InvalidConfig(_)
            | ScheduleError::UnknownInstructor(_)
            | ScheduleError::UnknownEngagement(_)
            | ScheduleError::MalformedFeed(_) => ErrorClass::Validation,
            ScheduleError::QueueInactive(_)
            | ScheduleError::QueueHeld(_)
            | ScheduleError::AxisLocked(_)
            | ScheduleError::NoProposal(_)
            | ScheduleError::CompletedImmutable(_)
            | ScheduleError::StatusRegression { .. }
            | ScheduleError::DuplicateStart { .. }
            | ScheduleError::DuplicateEngagement(_)
            | ScheduleError::OrderViolation { .. }
            | ScheduleError::ShiftOutOfBounds { .. }
            | ScheduleError::CapacityExceeded { .. }
            | ScheduleError::WrongQueue { .. } => ErrorClass::Policy,
            ScheduleError::ConfirmationTimeout { .. } => ErrorClass::ConfirmationTimeout,
            ScheduleError::FeedInconsistency(_) => ErrorClass::FeedInconsistency,
        }
    }

    /// Timeouts and feed inconsistencies are surfaced for the operator to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::ConfirmationTimeout | ErrorClass::FeedInconsistency
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_out_of_bounds_message() {
        let err = ScheduleError::OutOfBounds {
            minute: 21 * 60,
            bounds: DayBounds::default(),
        };
        assert_eq!(err.to_string(), "21:00 is outside the operating day 08:00-20:00");
        assert_eq!(err.class(), ErrorClass::Validation);

        let err = ScheduleError::OutOfBounds {
            minute: -30,
            bounds: DayBounds::default(),
        };
        assert!(err.to_string().starts_with("minute -30"));
    }

    #[test]
    fn test_bulk_shift_out_of_bounds_is_policy() {
        let err = ScheduleError::ShiftOutOfBounds {
            instructor_id: InstructorId::new(),
            minute: 20 * 60 + 15,
            bounds: DayBounds::default(),
        };
        assert_eq!(err.class(), ErrorClass::Policy);
        assert!(err.to_string().contains("20:15"));
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = ScheduleError::ConfirmationTimeout {
            engagement_id: EngagementId::new(),
            source: ReconcileError::Timeout {
                resource: "eng".into(),
                elapsed: Duration::from_secs(5),
            },
        };
        assert!(err.is_retryable());
        assert!(!ScheduleError::QueueInactive(InstructorId::new()).is_retryable());
        assert_eq!(
            ScheduleError::AxisLocked(Axis::Time).class(),
            ErrorClass::Policy
        );
    }
}
