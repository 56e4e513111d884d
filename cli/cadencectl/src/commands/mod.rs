//! CLI commands.

mod audit;
mod optimise;
mod propagate;
mod replay;
mod stats;
mod sync;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use cadence_id::InstructorId;
use cadence_schedule::{CoordinatorConfig, DayBounds, DayFeed, ScheduleCoordinator};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use crate::config::Config;
use crate::error::CliError;
use crate::output::{print_warning, OutputFormat};

/// cadence - align and inspect instructor day schedules.
#[derive(Debug, Parser)]
#[command(name = "cadence")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Log filter directive, e.g. `debug` or `cadence_schedule=trace`.
    #[arg(long, global = true, env = "CADENCE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Required gap between engagements, in minutes.
    #[arg(long, global = true)]
    required_gap: Option<u32>,

    /// Start of the operating day (HH:MM).
    #[arg(long, global = true)]
    day_start: Option<String>,

    /// End of the operating day (HH:MM).
    #[arg(long, global = true)]
    day_end: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Classify the spacing of every engagement against its predecessor.
    Audit(audit::AuditCommand),

    /// Revenue, commission and timing totals for the day.
    Stats(stats::StatsCommand),

    /// Show how far the queues agree with a proposed time and location.
    Sync(sync::SyncCommand),

    /// Close gaps in every active queue.
    Optimise(optimise::OptimiseCommand),

    /// Push a proposed time or location into the queues.
    Propagate(propagate::PropagateCommand),

    /// Run a JSON-lines script of operator commands and confirmations.
    Replay(replay::ReplayCommand),

    /// Show the effective configuration.
    Config,
}

impl Cli {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn log_json(&self) -> bool {
        self.log_json
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let mut schedule = Config::load()?.with_env()?;
        if let Some(gap) = self.required_gap {
            schedule.required_gap = gap;
        }
        if self.day_start.is_some() || self.day_end.is_some() {
            let bounds = schedule.bounds;
            schedule.bounds = DayBounds::parse(
                self.day_start.as_deref().unwrap_or(&cadence_schedule::time::to_hhmm(bounds.min)),
                self.day_end.as_deref().unwrap_or(&cadence_schedule::time::to_hhmm(bounds.max)),
            )
            .map_err(CliError::from)?;
        }
        debug!(?schedule, "Effective configuration");

        let ctx = CommandContext {
            schedule,
            format: self.format,
        };

        match self.command {
            Commands::Audit(cmd) => cmd.run(ctx),
            Commands::Stats(cmd) => cmd.run(ctx),
            Commands::Sync(cmd) => cmd.run(ctx),
            Commands::Optimise(cmd) => cmd.run(ctx),
            Commands::Propagate(cmd) => cmd.run(ctx),
            Commands::Replay(cmd) => cmd.run(ctx).await,
            Commands::Config => {
                crate::output::print_single(&ctx.schedule);
                Ok(())
            }
        }
    }
}

/// The day feed a command operates on.
#[derive(Debug, Args)]
pub struct FeedArgs {
    /// Path to the day feed snapshot (JSON).
    #[arg(value_name = "FEED")]
    pub path: PathBuf,
}

/// Shared command context.
pub struct CommandContext {
    pub schedule: CoordinatorConfig,
    pub format: OutputFormat,
}

/// A loaded day: the coordinator plus the feed it was built from.
pub struct LoadedDay {
    pub coordinator: ScheduleCoordinator,
    pub feed: DayFeed,
}

impl LoadedDay {
    /// Display name from the feed, or the short id.
    pub fn name(&self, instructor_id: &InstructorId) -> String {
        self.feed
            .display_name(instructor_id)
            .map(String::from)
            .unwrap_or_else(|| instructor_id.short())
    }

    /// Write the coordinator's current queues, keeping the feed's names.
    pub fn write_snapshot(&self, path: &Path) -> Result<()> {
        let mut snapshot = self.coordinator.snapshot();
        for instructor in &mut snapshot.instructors {
            instructor.name = self
                .feed
                .display_name(&instructor.instructor_id)
                .map(String::from);
        }
        let json = snapshot.to_json_pretty().map_err(CliError::from)?;
        fs::write(path, json).map_err(|source| CliError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

impl CommandContext {
    /// Read a feed and load it into a fresh coordinator.
    pub fn open(&self, path: &Path) -> Result<LoadedDay> {
        let feed = read_feed(path)?;
        let (coordinator, report) =
            ScheduleCoordinator::from_feed(&feed, self.schedule.clone()).map_err(CliError::from)?;
        for (id, reason) in &report.rejected {
            print_warning(&format!("Skipped {id}: {reason}"));
        }
        Ok(LoadedDay { coordinator, feed })
    }
}

pub fn read_feed(path: &Path) -> Result<DayFeed> {
    let json = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(DayFeed::from_json(&json).map_err(CliError::from)?)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use cadence_id::{EngagementId, LessonId};
    use cadence_schedule::{
        time, CompensationModel, Engagement, EngagementStatus, FeedInstructor, Money,
        PackageEconomics,
    };
    use chrono::NaiveDate;

    use super::*;

    pub fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 9).unwrap()
    }

    pub fn engagement(instructor: InstructorId, start: &str, duration: u32) -> Engagement {
        Engagement {
            id: EngagementId::new(),
            instructor_id: instructor,
            lesson_id: LessonId::new(),
            booking_id: None,
            date: day(),
            start: time::to_minutes(start),
            duration,
            location: "North Beach".into(),
            status: EngagementStatus::Planned,
            compensation: CompensationModel::Fixed {
                rate_per_hour: Money::from_units(30),
            },
            package: PackageEconomics {
                price_per_participant: Money::from_units(60),
                participant_capacity: 4,
                equipment_capacity: 4,
                nominal_duration: 60,
                equipment_category: None,
            },
            participants: 2,
            equipment: vec![],
        }
    }

    /// Two instructors: Ana 09:00-10:00 and 10:40, Ben 09:30.
    pub fn feed() -> DayFeed {
        let ana = InstructorId::new();
        let ben = InstructorId::new();
        DayFeed {
            day: day(),
            instructors: vec![
                FeedInstructor {
                    instructor_id: ana,
                    name: Some("Ana".into()),
                    active: true,
                    engagements: vec![engagement(ana, "09:00", 60), engagement(ana, "10:40", 30)],
                },
                FeedInstructor {
                    instructor_id: ben,
                    name: Some("Ben".into()),
                    active: true,
                    engagements: vec![engagement(ben, "09:30", 60)],
                },
            ],
        }
    }

    pub fn context() -> CommandContext {
        CommandContext {
            schedule: CoordinatorConfig::default(),
            format: OutputFormat::Json,
        }
    }

    /// Write the feed to a temp file and load it.
    pub fn loaded(dir: &tempfile::TempDir) -> LoadedDay {
        let path = dir.path().join("day.json");
        fs::write(&path, feed().to_json_pretty().unwrap()).unwrap();
        context().open(&path).unwrap()
    }
}
