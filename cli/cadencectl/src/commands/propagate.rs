//! Push the proposed time or location into the queues.

use std::path::PathBuf;

use anyhow::Result;
use cadence_id::InstructorId;
use cadence_schedule::{Axis, PropagationSummary};
use clap::{ArgGroup, Args};
use serde::Serialize;
use tabled::Tabled;

use crate::error::CliError;
use crate::output::{print_info, print_output, print_warning, OutputFormat};

use super::{CommandContext, FeedArgs, LoadedDay};

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("proposal").required(true).multiple(true).args(["time", "location"])))]
pub struct PropagateCommand {
    #[command(flatten)]
    feed: FeedArgs,

    /// Align every next pending engagement to this start time (HH:MM).
    #[arg(long)]
    time: Option<String>,

    /// Move every pending engagement to this location.
    #[arg(long)]
    location: Option<String>,

    /// Only propagate into this instructor's queue.
    #[arg(long)]
    instructor: Option<InstructorId>,

    /// Hold these queues out of propagation.
    #[arg(long = "hold", value_name = "INSTRUCTOR")]
    held: Vec<InstructorId>,

    /// Write the resulting day to this path.
    #[arg(long, value_name = "PATH")]
    write: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct PropagationLine {
    #[tabled(rename = "Axis")]
    axis: Axis,
    #[tabled(rename = "Applied")]
    applied: usize,
    #[tabled(rename = "Changed")]
    moved: usize,
    #[tabled(rename = "Skipped")]
    skipped: usize,
    #[tabled(rename = "Lock after")]
    lock: String,
}

impl PropagateCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        let mut day = ctx.open(&self.feed.path)?;
        for instructor_id in &self.held {
            day.coordinator
                .set_queue_held(*instructor_id, true)
                .map_err(CliError::from)?;
        }

        let mut lines = Vec::new();
        if let Some(time) = &self.time {
            day.coordinator.adjust_time(time).map_err(CliError::from)?;
            lines.push(self.apply(&mut day, Axis::Time)?);
        }
        if let Some(location) = &self.location {
            day.coordinator
                .adjust_location(location)
                .map_err(CliError::from)?;
            lines.push(self.apply(&mut day, Axis::Location)?);
        }

        print_output(&lines, ctx.format);
        if let Some(path) = &self.write {
            day.write_snapshot(path)?;
            if ctx.format == OutputFormat::Table {
                print_info(&format!("Wrote {}", path.display()));
            }
        }
        Ok(())
    }

    fn apply(&self, day: &mut LoadedDay, axis: Axis) -> Result<PropagationLine> {
        let summary = match self.instructor {
            Some(instructor_id) => {
                let moved = day
                    .coordinator
                    .propagate(axis, instructor_id)
                    .map_err(CliError::from)?;
                PropagationSummary {
                    applied: vec![instructor_id],
                    moved,
                    skipped: Vec::new(),
                }
            }
            None => day.coordinator.propagate_all(axis).map_err(CliError::from)?,
        };

        for skipped in &summary.skipped {
            print_warning(&format!(
                "{} skipped: {}",
                day.name(&skipped.instructor_id),
                skipped.reason
            ));
        }
        Ok(PropagationLine {
            axis,
            applied: summary.applied.len(),
            moved: summary.moved,
            skipped: summary.skipped.len(),
            lock: day.coordinator.lock(axis).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::loaded;

    fn command(time: Option<&str>) -> PropagateCommand {
        PropagateCommand {
            feed: FeedArgs {
                path: PathBuf::from("unused.json"),
            },
            time: time.map(String::from),
            location: None,
            instructor: None,
            held: Vec::new(),
            write: None,
        }
    }

    #[test]
    fn test_time_propagation_locks() {
        let dir = tempfile::tempdir().unwrap();
        let mut day = loaded(&dir);
        day.coordinator.adjust_time("10:00").unwrap();

        let line = command(Some("10:00")).apply(&mut day, Axis::Time).unwrap();
        assert_eq!(line.applied, 2);
        assert_eq!(line.moved, 3);
        assert_eq!(line.lock, "auto-locked");
    }

    #[test]
    fn test_held_queue_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut day = loaded(&dir);
        let ben = day.feed.instructors[1].instructor_id;
        day.coordinator.set_queue_held(ben, true).unwrap();
        day.coordinator.adjust_time("10:00").unwrap();

        let line = command(Some("10:00")).apply(&mut day, Axis::Time).unwrap();
        assert_eq!(line.applied, 1);
        assert_eq!(line.skipped, 1);
        assert_eq!(line.lock, "unlocked");
    }
}
