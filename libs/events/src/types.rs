//! Change kinds and the confirmation feed message.

use cadence_id::{EngagementId, InstructorId, Seq};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::EventError;

// =============================================================================
// Change Kinds
// =============================================================================

/// What changed. Carried by every [`crate::ChangeNotice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ChangeKind {
    // Engagement
    EngagementInserted,
    EngagementUpdated,
    EngagementRemoved,
    EngagementConfirmed,
    EngagementRolledBack,

    // Queue
    QueueShifted,
    QueueLocationSet,
    QueueActivated,
    QueueDeactivated,
    QueueHeld,
    QueueReleased,
    QueuesOptimised,

    // Shared proposal
    ProposalTimeChanged,
    ProposalLocationChanged,
    TimeLockChanged,
    LocationLockChanged,
    RequiredGapChanged,

    // Upstream feed
    FeedReconciled,
}

impl ChangeKind {
    /// Every kind, in declaration order.
    pub const ALL: [ChangeKind; 18] = [
        ChangeKind::EngagementInserted,
        ChangeKind::EngagementUpdated,
        ChangeKind::EngagementRemoved,
        ChangeKind::EngagementConfirmed,
        ChangeKind::EngagementRolledBack,
        ChangeKind::QueueShifted,
        ChangeKind::QueueLocationSet,
        ChangeKind::QueueActivated,
        ChangeKind::QueueDeactivated,
        ChangeKind::QueueHeld,
        ChangeKind::QueueReleased,
        ChangeKind::QueuesOptimised,
        ChangeKind::ProposalTimeChanged,
        ChangeKind::ProposalLocationChanged,
        ChangeKind::TimeLockChanged,
        ChangeKind::LocationLockChanged,
        ChangeKind::RequiredGapChanged,
        ChangeKind::FeedReconciled,
    ];

    /// Dotted wire name, e.g. `queue.shifted`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::EngagementInserted => "engagement.inserted",
            ChangeKind::EngagementUpdated => "engagement.updated",
            ChangeKind::EngagementRemoved => "engagement.removed",
            ChangeKind::EngagementConfirmed => "engagement.confirmed",
            ChangeKind::EngagementRolledBack => "engagement.rolled_back",
            ChangeKind::QueueShifted => "queue.shifted",
            ChangeKind::QueueLocationSet => "queue.location_set",
            ChangeKind::QueueActivated => "queue.activated",
            ChangeKind::QueueDeactivated => "queue.deactivated",
            ChangeKind::QueueHeld => "queue.held",
            ChangeKind::QueueReleased => "queue.released",
            ChangeKind::QueuesOptimised => "queues.optimised",
            ChangeKind::ProposalTimeChanged => "proposal.time_changed",
            ChangeKind::ProposalLocationChanged => "proposal.location_changed",
            ChangeKind::TimeLockChanged => "lock.time_changed",
            ChangeKind::LocationLockChanged => "lock.location_changed",
            ChangeKind::RequiredGapChanged => "settings.required_gap_changed",
            ChangeKind::FeedReconciled => "feed.reconciled",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChangeKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChangeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EventError::UnknownChangeKind(s.to_string()))
    }
}

impl From<ChangeKind> for String {
    fn from(kind: ChangeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl TryFrom<String> for ChangeKind {
    type Error = EventError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// =============================================================================
// Confirmation Feed
// =============================================================================

/// One message from the durable store's per-day change feed.
///
/// A message acknowledges every engagement it lists. When `engagement_ids` is
/// empty and `instructor_id` is set, it acknowledges that instructor's whole
/// queue for the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationMessage {
    /// Feed position, strictly increasing per day.
    pub seq: Seq,

    /// Operating day the write belongs to.
    pub day: NaiveDate,

    /// Instructor whose queue the write touched, if scoped to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor_id: Option<InstructorId>,

    /// Engagements touched by the write.
    #[serde(default)]
    pub engagement_ids: Vec<EngagementId>,
}

impl ConfirmationMessage {
    /// Decodes a message from one JSON line of the feed.
    pub fn from_json(line: &str) -> Result<Self, EventError> {
        let message: ConfirmationMessage = serde_json::from_str(line)?;
        if message.instructor_id.is_none() && message.engagement_ids.is_empty() {
            return Err(EventError::InvalidPayload(format!(
                "confirmation {} touches nothing",
                message.seq
            )));
        }
        Ok(message)
    }

    /// Returns true if this message acknowledges the given engagement.
    pub fn touches(&self, engagement_id: &EngagementId, owner: &InstructorId) -> bool {
        if self.engagement_ids.is_empty() {
            return self.instructor_id.as_ref() == Some(owner);
        }
        self.engagement_ids.contains(engagement_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_kind_wire_names_roundtrip() {
        for kind in ChangeKind::ALL {
            let parsed: ChangeKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_change_kind_unknown() {
        let err = "queue.exploded".parse::<ChangeKind>().unwrap_err();
        assert!(matches!(err, EventError::UnknownChangeKind(_)));
    }

    #[test]
    fn test_change_kind_serializes_as_string() {
        let json = serde_json::to_string(&ChangeKind::QueueShifted).unwrap();
        assert_eq!(json, "\"queue.shifted\"");
    }

    #[test]
    fn test_confirmation_from_json() {
        let eng = EngagementId::new();
        let line = format!(r#"{{"seq": 4, "day": "2026-03-14", "engagement_ids": ["{eng}"]}}"#);
        let msg = ConfirmationMessage::from_json(&line).unwrap();
        assert_eq!(msg.seq, Seq::new(4));
        assert!(msg.touches(&eng, &InstructorId::new()));
        assert!(!msg.touches(&EngagementId::new(), &InstructorId::new()));
    }

    #[test]
    fn test_confirmation_scoped_to_instructor() {
        let owner = InstructorId::new();
        let msg = ConfirmationMessage {
            seq: Seq::new(1),
            day: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            instructor_id: Some(owner),
            engagement_ids: vec![],
        };
        assert!(msg.touches(&EngagementId::new(), &owner));
        assert!(!msg.touches(&EngagementId::new(), &InstructorId::new()));
    }

    #[test]
    fn test_confirmation_touching_nothing_is_rejected() {
        let err = ConfirmationMessage::from_json(r#"{"seq": 2, "day": "2026-03-14"}"#)
            .unwrap_err();
        assert!(matches!(err, EventError::InvalidPayload(_)));
    }
}
