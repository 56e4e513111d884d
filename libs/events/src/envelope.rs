//! The change notice - the one signal every committed mutation emits.

use cadence_id::Seq;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ChangeKind, EventError};

/// Who caused the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// An operator command.
    Operator,
    /// The upstream booking feed or its confirmation channel.
    Feed,
    /// The core itself (reconciliation, confirmation timeouts).
    #[default]
    System,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Operator => write!(f, "operator"),
            Origin::Feed => write!(f, "feed"),
            Origin::System => write!(f, "system"),
        }
    }
}

/// Which kind of record the subject id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChangeScope {
    Engagement,
    Queue,
    #[default]
    Coordinator,
}

impl std::fmt::Display for ChangeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeScope::Engagement => "engagement",
            ChangeScope::Queue => "queue",
            ChangeScope::Coordinator => "coordinator",
        };
        write!(f, "{}", s)
    }
}

/// A signal-only change notification.
///
/// Carries no diff: receivers re-read the coordinator to see the new state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    /// Monotonic per-session sequence number.
    pub seq: Seq,

    /// When the mutation was committed.
    pub occurred_at: DateTime<Utc>,

    /// What changed.
    pub kind: ChangeKind,

    /// Which kind of record `subject_id` names.
    pub scope: ChangeScope,

    /// The record that changed, if the change is about a single record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,

    /// Who caused the change.
    pub origin: Origin,
}

impl ChangeNotice {
    /// Creates a new change notice builder.
    pub fn builder() -> ChangeNoticeBuilder {
        ChangeNoticeBuilder::new()
    }
}

impl std::fmt::Display for ChangeNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {} ({})", self.seq, self.kind, self.origin)?;
        if let Some(subject) = &self.subject_id {
            write!(f, " {}={}", self.scope, subject)?;
        }
        Ok(())
    }
}

/// Builder for constructing change notices.
#[derive(Debug, Default)]
pub struct ChangeNoticeBuilder {
    seq: Option<Seq>,
    occurred_at: Option<DateTime<Utc>>,
    kind: Option<ChangeKind>,
    scope: ChangeScope,
    subject_id: Option<String>,
    origin: Origin,
}

impl ChangeNoticeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seq(mut self, seq: Seq) -> Self {
        self.seq = Some(seq);
        self
    }

    pub fn occurred_at(mut self, ts: DateTime<Utc>) -> Self {
        self.occurred_at = Some(ts);
        self
    }

    pub fn kind(mut self, kind: ChangeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn subject(mut self, scope: ChangeScope, id: impl ToString) -> Self {
        self.scope = scope;
        self.subject_id = Some(id.to_string());
        self
    }

    pub fn origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Builds the notice. `seq` and `kind` are required.
    pub fn build(self) -> Result<ChangeNotice, EventError> {
        let seq = self
            .seq
            .ok_or_else(|| EventError::InvalidPayload("notice seq is required".into()))?;
        let kind = self
            .kind
            .ok_or_else(|| EventError::InvalidPayload("notice kind is required".into()))?;

        Ok(ChangeNotice {
            seq,
            occurred_at: self.occurred_at.unwrap_or_else(Utc::now),
            kind,
            scope: self.scope,
            subject_id: self.subject_id,
            origin: self.origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_id::InstructorId;

    #[test]
    fn test_origin_serialization() {
        assert_eq!(serde_json::to_string(&Origin::Operator).unwrap(), "\"operator\"");
        assert_eq!(serde_json::to_string(&Origin::Feed).unwrap(), "\"feed\"");
        assert_eq!(serde_json::to_string(&Origin::System).unwrap(), "\"system\"");
    }

    #[test]
    fn test_change_notice_builder() {
        let instructor = InstructorId::new();
        let notice = ChangeNotice::builder()
            .seq(Seq::new(3))
            .kind(ChangeKind::QueueShifted)
            .subject(ChangeScope::Queue, instructor)
            .origin(Origin::Operator)
            .build()
            .unwrap();

        assert_eq!(notice.kind, ChangeKind::QueueShifted);
        assert_eq!(notice.scope, ChangeScope::Queue);
        assert_eq!(notice.subject_id, Some(instructor.to_string()));
        assert!(notice.to_string().starts_with("#3 queue.shifted (operator) queue="));
    }

    #[test]
    fn test_coordinator_notice_has_no_subject() {
        let notice = ChangeNotice::builder()
            .seq(Seq::new(1))
            .kind(ChangeKind::ProposalTimeChanged)
            .build()
            .unwrap();

        assert_eq!(notice.scope, ChangeScope::Coordinator);
        let json = serde_json::to_value(&notice).unwrap();
        assert!(json.get("subject_id").is_none());
        assert_eq!(json["kind"], "proposal.time_changed");
    }

    #[test]
    fn test_builder_requires_kind() {
        let err = ChangeNotice::builder().seq(Seq::new(1)).build().unwrap_err();
        assert!(matches!(err, EventError::InvalidPayload(_)));
    }
}
