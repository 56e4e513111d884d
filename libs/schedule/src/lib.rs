//! # cadence-schedule
//!
//! Live day schedules for a team of instructors.
//!
//! Each instructor runs an [`InstructorQueue`] of time-boxed engagements for
//! one operating day. The [`ScheduleCoordinator`] holds a shared proposed
//! start time and location, locks each axis automatically once every active
//! queue agrees with it, and pushes operator changes back into the queues.
//!
//! ## Modules
//!
//! - [`time`]: `HH:MM` conversions and the operating day window
//! - [`gap`]: how an engagement sits relative to its predecessor
//! - [`commission`]: revenue proration and the two pay models
//! - [`queue`]: one instructor's ordered engagements
//! - [`coordinator`]: the shared proposal, locks, propagation and confirmations
//! - [`stats`]: read-only rollups for the day
//! - [`feed`]: the upstream day snapshot and its reconciliation report

pub mod commission;
pub mod config;
pub mod coordinator;
pub mod engagement;
pub mod error;
pub mod feed;
pub mod gap;
pub mod money;
pub mod notify;
pub mod optimistic;
pub mod queue;
pub mod stats;
pub mod time;

pub use commission::{CompensationModel, Earnings};
pub use config::CoordinatorConfig;
pub use coordinator::{OptimiseSummary, PropagationSummary, ScheduleCoordinator, SkippedQueue};
pub use engagement::{Engagement, EngagementFields, EngagementStatus, PackageEconomics};
pub use error::{ErrorClass, ScheduleError, ScheduleResult};
pub use feed::{DayFeed, FeedInstructor, FeedReport};
pub use gap::{GapRecord, GapState};
pub use money::Money;
pub use optimistic::{Clock, ManualClock, SystemClock};
pub use queue::{InstructorQueue, QueueOptimisation};
pub use stats::DayStatistics;
pub use time::DayBounds;

use serde::{Deserialize, Serialize};

/// The two things the shared proposal aligns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Time,
    Location,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Time => f.write_str("time"),
            Axis::Location => f.write_str("location"),
        }
    }
}
