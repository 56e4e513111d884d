//! Replay a script of operator commands and confirmations against a day.
//!
//! The script is JSON lines, one step per line, tagged by `op`:
//!
//! ```text
//! # align everyone to ten o'clock
//! {"op": "adjust_time", "time": "10:00"}
//! {"op": "propagate_time"}
//! {"op": "confirm", "seq": 1, "instructor_id": "ins_01HV4Z2WQXKJNM8GPQY6VBKC3D"}
//! {"op": "advance", "ms": 6000}
//! ```
//!
//! Time is virtual unless `--realtime` is given, so `advance` fires
//! confirmation timeouts immediately.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cadence_events::{ChangeNotice, ConfirmationMessage};
use cadence_id::{EngagementId, InstructorId, Seq};
use cadence_schedule::{
    Axis, Clock, CoordinatorConfig, DayFeed, EngagementStatus, ManualClock, ScheduleCoordinator,
    ScheduleError, ScheduleResult, SystemClock,
};
use chrono::NaiveDate;
use clap::Args;
use serde::{Deserialize, Serialize};
use tabled::Tabled;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::error::CliError;
use crate::output::{display_option, print_info, print_output, print_single, print_warning, OutputFormat};

use super::{read_feed, CommandContext, FeedArgs, LoadedDay};

#[derive(Debug, Args)]
pub struct ReplayCommand {
    #[command(flatten)]
    feed: FeedArgs,

    /// JSON-lines script to replay.
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,

    /// Sleep for real on `advance` instead of moving a virtual clock.
    #[arg(long)]
    realtime: bool,

    /// Write the final day to this path.
    #[arg(long, value_name = "PATH")]
    write: Option<PathBuf>,
}

/// One scripted step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    AdjustTime {
        time: String,
    },
    AdjustTimeStep {
        step: i32,
    },
    AdjustLocation {
        location: String,
    },
    ToggleTimeLock,
    ToggleLocationLock,
    UpdateRequiredGap {
        delta: i32,
    },
    Optimise,
    PropagateTime {
        #[serde(default)]
        instructor_id: Option<InstructorId>,
    },
    PropagateLocation {
        #[serde(default)]
        instructor_id: Option<InstructorId>,
    },
    SetActive {
        instructor_id: InstructorId,
        active: bool,
    },
    SetHeld {
        instructor_id: InstructorId,
        held: bool,
    },
    Move {
        engagement_id: EngagementId,
        start: String,
    },
    Resize {
        engagement_id: EngagementId,
        duration: u32,
    },
    Relocate {
        engagement_id: EngagementId,
        location: String,
    },
    Status {
        engagement_id: EngagementId,
        status: EngagementStatus,
    },
    Remove {
        engagement_id: EngagementId,
    },
    Confirm {
        seq: u64,
        /// Defaults to the replayed day.
        #[serde(default)]
        day: Option<NaiveDate>,
        #[serde(default)]
        instructor_id: Option<InstructorId>,
        #[serde(default)]
        engagement_ids: Vec<EngagementId>,
    },
    Advance {
        ms: u64,
    },
}

impl Step {
    fn op(&self) -> &'static str {
        match self {
            Step::AdjustTime { .. } => "adjust_time",
            Step::AdjustTimeStep { .. } => "adjust_time_step",
            Step::AdjustLocation { .. } => "adjust_location",
            Step::ToggleTimeLock => "toggle_time_lock",
            Step::ToggleLocationLock => "toggle_location_lock",
            Step::UpdateRequiredGap { .. } => "update_required_gap",
            Step::Optimise => "optimise",
            Step::PropagateTime { .. } => "propagate_time",
            Step::PropagateLocation { .. } => "propagate_location",
            Step::SetActive { .. } => "set_active",
            Step::SetHeld { .. } => "set_held",
            Step::Move { .. } => "move",
            Step::Resize { .. } => "resize",
            Step::Relocate { .. } => "relocate",
            Step::Status { .. } => "status",
            Step::Remove { .. } => "remove",
            Step::Confirm { .. } => "confirm",
            Step::Advance { .. } => "advance",
        }
    }
}

/// Parse a script, skipping blank lines and `#` comments.
fn parse_script(text: &str) -> Result<Vec<(usize, Step)>, CliError> {
    let mut steps = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let step: Step =
            serde_json::from_str(trimmed).map_err(|e| CliError::script(line, e.to_string()))?;
        if let Step::Confirm {
            instructor_id: None,
            engagement_ids,
            ..
        } = &step
        {
            if engagement_ids.is_empty() {
                return Err(CliError::script(line, "confirmation touches nothing"));
            }
        }
        steps.push((line, step));
    }
    Ok(steps)
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct StepLine {
    #[tabled(rename = "Line")]
    line: usize,
    #[tabled(rename = "Op")]
    op: String,
    #[tabled(rename = "Result")]
    outcome: String,
    #[tabled(rename = "Ok")]
    ok: bool,
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct NoticeLine {
    #[tabled(rename = "Seq")]
    seq: Seq,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Scope")]
    scope: String,
    #[tabled(rename = "Subject", display = "display_option")]
    subject: Option<String>,
    #[tabled(rename = "Origin")]
    origin: String,
}

impl From<ChangeNotice> for NoticeLine {
    fn from(notice: ChangeNotice) -> Self {
        Self {
            seq: notice.seq,
            kind: notice.kind.to_string(),
            scope: notice.scope.to_string(),
            subject: notice.subject_id,
            origin: notice.origin.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    steps: Vec<StepLine>,
    notices: Vec<NoticeLine>,
    rolled_back: usize,
}

/// Drives a coordinator through a script.
struct Replayer {
    coordinator: ScheduleCoordinator,
    /// Present unless replaying in real time.
    clock: Option<Arc<ManualClock>>,
    notices: broadcast::Receiver<ChangeNotice>,
    rolled_back: usize,
}

impl Replayer {
    fn new(feed: &DayFeed, config: CoordinatorConfig, realtime: bool) -> ScheduleResult<Self> {
        let manual = (!realtime).then(|| Arc::new(ManualClock::new()));
        let clock: Arc<dyn Clock> = match &manual {
            Some(clock) => clock.clone() as Arc<dyn Clock>,
            None => Arc::new(SystemClock),
        };
        let mut coordinator = ScheduleCoordinator::with_clock(feed.day, config, clock)?;
        let report = coordinator.reconcile_feed(feed)?;
        for (id, reason) in &report.rejected {
            print_warning(&format!("Skipped {id}: {reason}"));
        }
        let notices = coordinator.subscribe();
        Ok(Self {
            coordinator,
            clock: manual,
            notices,
            rolled_back: 0,
        })
    }

    async fn step(&mut self, step: &Step) -> ScheduleResult<String> {
        let c = &mut self.coordinator;
        let outcome = match step {
            Step::AdjustTime { time } => changed(c.adjust_time(time)?, "proposal set"),
            Step::AdjustTimeStep { step } => changed(c.adjust_time_step(*step)?, "proposal stepped"),
            Step::AdjustLocation { location } => changed(c.adjust_location(location)?, "proposal set"),
            Step::ToggleTimeLock => format!("time {}", c.toggle_time_lock()),
            Step::ToggleLocationLock => format!("location {}", c.toggle_location_lock()),
            Step::UpdateRequiredGap { delta } => {
                format!("required gap {}", c.update_required_gap(*delta)?)
            }
            Step::Optimise => {
                let summary = c.optimise_all_queues();
                format!(
                    "moved {}, overlaps {}, blocked {}",
                    summary.moved, summary.overlaps, summary.blocked
                )
            }
            Step::PropagateTime { instructor_id } => propagate(c, Axis::Time, *instructor_id)?,
            Step::PropagateLocation { instructor_id } => {
                propagate(c, Axis::Location, *instructor_id)?
            }
            Step::SetActive {
                instructor_id,
                active,
            } => changed(c.set_queue_active(*instructor_id, *active)?, "queue updated"),
            Step::SetHeld {
                instructor_id,
                held,
            } => changed(c.set_queue_held(*instructor_id, *held)?, "queue updated"),
            Step::Move {
                engagement_id,
                start,
            } => {
                c.move_engagement(engagement_id, start)?;
                format!("moved to {start}")
            }
            Step::Resize {
                engagement_id,
                duration,
            } => {
                c.resize_engagement(engagement_id, *duration)?;
                format!("{duration} minutes")
            }
            Step::Relocate {
                engagement_id,
                location,
            } => {
                c.relocate_engagement(engagement_id, location)?;
                format!("at {location}")
            }
            Step::Status {
                engagement_id,
                status,
            } => {
                c.advance_status(engagement_id, *status)?;
                status.to_string()
            }
            Step::Remove { engagement_id } => {
                let removed = c.remove_engagement(engagement_id)?;
                format!("removed {}", removed.start_hhmm())
            }
            Step::Confirm {
                seq,
                day,
                instructor_id,
                engagement_ids,
            } => {
                let message = ConfirmationMessage {
                    seq: Seq::new(*seq),
                    day: day.unwrap_or_else(|| c.day()),
                    instructor_id: *instructor_id,
                    engagement_ids: engagement_ids.clone(),
                };
                let confirmed = c.apply_confirmation(&message)?;
                format!("confirmed {}", confirmed.len())
            }
            Step::Advance { ms } => {
                let by = Duration::from_millis(*ms);
                match &self.clock {
                    Some(clock) => clock.advance(by),
                    None => tokio::time::sleep(by).await,
                }
                let failures = c.expire_due();
                for failure in &failures {
                    print_warning(&failure.to_string());
                }
                self.rolled_back += failures.len();
                format!("rolled back {}", failures.len())
            }
        };
        Ok(outcome)
    }

    /// Everything published since the last drain.
    fn drain(&mut self) -> Vec<NoticeLine> {
        let mut lines = Vec::new();
        loop {
            match self.notices.try_recv() {
                Ok(notice) => lines.push(notice.into()),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Change notices dropped");
                }
                Err(_) => break,
            }
        }
        lines
    }

    async fn run(&mut self, steps: &[(usize, Step)]) -> ReplayReport {
        let mut report = ReplayReport {
            steps: Vec::with_capacity(steps.len()),
            notices: Vec::new(),
            rolled_back: 0,
        };
        for (line, step) in steps {
            let result = self.step(step).await;
            debug!(line, op = step.op(), ok = result.is_ok(), "Step replayed");
            let (outcome, ok) = match result {
                Ok(outcome) => (outcome, true),
                Err(err) => (describe(&err), false),
            };
            report.steps.push(StepLine {
                line: *line,
                op: step.op().to_string(),
                outcome,
                ok,
            });
            report.notices.extend(self.drain());
        }
        report.rolled_back = self.rolled_back;
        report
    }
}

fn changed(changed: bool, what: &str) -> String {
    if changed {
        what.to_string()
    } else {
        "unchanged".to_string()
    }
}

fn propagate(
    coordinator: &mut ScheduleCoordinator,
    axis: Axis,
    instructor_id: Option<InstructorId>,
) -> ScheduleResult<String> {
    match instructor_id {
        Some(id) => {
            let moved = coordinator.propagate(axis, id)?;
            Ok(format!("moved {moved}"))
        }
        None => {
            let summary = coordinator.propagate_all(axis)?;
            Ok(format!(
                "{} queue(s), moved {}, skipped {}",
                summary.applied.len(),
                summary.moved,
                summary.skipped.len()
            ))
        }
    }
}

fn describe(err: &ScheduleError) -> String {
    format!("{} error: {err}", err.class())
}

impl ReplayCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let feed = read_feed(&self.feed.path)?;
        let text = fs::read_to_string(&self.script).map_err(|source| CliError::Read {
            path: self.script.clone(),
            source,
        })?;
        let steps = parse_script(&text)?;

        let mut replayer =
            Replayer::new(&feed, ctx.schedule.clone(), self.realtime).map_err(CliError::from)?;
        let report = replayer.run(&steps).await;

        match ctx.format {
            OutputFormat::Json => print_single(&report),
            OutputFormat::Table => {
                print_output(&report.steps, ctx.format);
                print_output(&report.notices, ctx.format);
                let pending = replayer.coordinator.confirming().len();
                if pending > 0 {
                    print_info(&format!("{pending} write(s) still awaiting confirmation"));
                }
            }
        }

        if let Some(path) = &self.write {
            let day = LoadedDay {
                coordinator: replayer.coordinator,
                feed,
            };
            day.write_snapshot(path)?;
        }
        Ok(())
    }
}
