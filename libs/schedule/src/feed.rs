//! The upstream day feed: every booking-derived engagement, keyed by
//! instructor.
//!
//! The feed is the source of truth for engagement records. Reconciling it into
//! the coordinator adds what is new, replaces what changed, and drops what has
//! disappeared; only engagements with an unacknowledged local write keep their
//! local schedule fields.

use cadence_id::{EngagementId, InstructorId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engagement::Engagement;
use crate::error::ScheduleResult;

/// One instructor's slice of the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedInstructor {
    pub instructor_id: InstructorId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default)]
    pub engagements: Vec<Engagement>,
}

fn default_active() -> bool {
    true
}

/// Snapshot of one operating day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayFeed {
    pub day: NaiveDate,
    #[serde(default)]
    pub instructors: Vec<FeedInstructor>,
}

impl DayFeed {
    pub fn from_json(json: &str) -> ScheduleResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> ScheduleResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn engagement_count(&self) -> usize {
        self.instructors.iter().map(|i| i.engagements.len()).sum()
    }

    pub fn display_name(&self, instructor_id: &InstructorId) -> Option<&str> {
        self.instructors
            .iter()
            .find(|i| &i.instructor_id == instructor_id)
            .and_then(|i| i.name.as_deref())
    }
}

/// Outcome of reconciling a feed into the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedReport {
    pub added: usize,
    pub updated: usize,

    /// Updated records whose schedule fields were kept because a local write
    /// is still awaiting confirmation.
    pub kept_local: usize,

    /// Local engagements the feed no longer lists.
    pub dropped: Vec<EngagementId>,

    /// Feed records refused by queue validation, with the reason.
    pub rejected: Vec<(EngagementId, String)>,
}

impl FeedReport {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty() && self.rejected.is_empty()
    }
}
