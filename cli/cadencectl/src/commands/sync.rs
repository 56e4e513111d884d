//! Consensus view against a proposed time and location.

use anyhow::Result;
use cadence_schedule::time::to_hhmm;
use cadence_schedule::{Axis, ScheduleCoordinator};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::error::CliError;
use crate::output::{display_option, print_output, print_single, OutputFormat};

use super::{CommandContext, FeedArgs, LoadedDay};

#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(flatten)]
    feed: FeedArgs,

    /// Proposed start time (HH:MM).
    #[arg(long)]
    time: Option<String>,

    /// Proposed location.
    #[arg(long)]
    location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct AxisLine {
    #[tabled(rename = "Axis")]
    axis: Axis,
    #[tabled(rename = "Proposal", display = "display_option")]
    proposal: Option<String>,
    #[tabled(rename = "Synced")]
    synced: usize,
    #[tabled(rename = "Active")]
    total: usize,
    #[tabled(rename = "Convergence")]
    convergence: String,
    #[tabled(rename = "Lock")]
    lock: String,
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct QueueLine {
    #[tabled(rename = "Instructor")]
    instructor: String,
    #[tabled(rename = "Active")]
    active: bool,
    #[tabled(rename = "Next", display = "display_option")]
    next_start: Option<String>,
    #[tabled(rename = "Location", display = "display_option")]
    next_location: Option<String>,
    #[tabled(rename = "Time ok")]
    time_ok: bool,
    #[tabled(rename = "Location ok")]
    location_ok: bool,
}

#[derive(Debug, Serialize)]
struct SyncReport {
    axes: Vec<AxisLine>,
    queues: Vec<QueueLine>,
}

impl SyncCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        let mut day = ctx.open(&self.feed.path)?;
        if let Some(time) = &self.time {
            day.coordinator.adjust_time(time).map_err(CliError::from)?;
        }
        if let Some(location) = &self.location {
            day.coordinator.adjust_location(location).map_err(CliError::from)?;
        }

        let report = SyncReport {
            axes: axis_lines(&day.coordinator),
            queues: queue_lines(&day),
        };
        match ctx.format {
            OutputFormat::Table => {
                print_output(&report.axes, ctx.format);
                print_output(&report.queues, ctx.format);
            }
            OutputFormat::Json => print_single(&report),
        }
        Ok(())
    }
}

fn axis_lines(coordinator: &ScheduleCoordinator) -> Vec<AxisLine> {
    [Axis::Time, Axis::Location]
        .into_iter()
        .map(|axis| {
            let sync = coordinator.sync(axis);
            let proposal = match axis {
                Axis::Time => coordinator.proposed_time().map(to_hhmm),
                Axis::Location => coordinator.proposed_location().map(String::from),
            };
            AxisLine {
                axis,
                proposal,
                synced: sync.synced,
                total: sync.total,
                convergence: sync.status().to_string(),
                lock: coordinator.lock(axis).to_string(),
            }
        })
        .collect()
}

fn queue_lines(day: &LoadedDay) -> Vec<QueueLine> {
    let coordinator = &day.coordinator;
    coordinator
        .queues()
        .map(|queue| {
            let next = queue.next_pending();
            QueueLine {
                instructor: day.name(&queue.instructor_id()),
                active: queue.is_active(),
                next_start: next.map(|e| e.start_hhmm()),
                next_location: next.map(|e| e.location.clone()),
                time_ok: next.is_some_and(|e| coordinator.proposed_time() == Some(e.start)),
                location_ok: next
                    .is_some_and(|e| coordinator.proposed_location() == Some(e.location.as_str())),
            }
        })
        .collect()
}
