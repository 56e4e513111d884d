//! Day statistics.

use anyhow::Result;
use cadence_schedule::DayStatistics;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_info, print_output, print_single, OutputFormat};

use super::{CommandContext, FeedArgs, LoadedDay};

#[derive(Debug, Args)]
pub struct StatsCommand {
    #[command(flatten)]
    feed: FeedArgs,

    /// List per-lesson subtotals instead of per-instructor rows.
    #[arg(long)]
    by_lesson: bool,
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct InstructorLine {
    #[tabled(rename = "Instructor")]
    instructor: String,
    #[tabled(rename = "Active")]
    active: bool,
    #[tabled(rename = "Sessions")]
    engagements: usize,
    #[tabled(rename = "Minutes")]
    minutes: u64,
    #[tabled(rename = "Revenue")]
    revenue: String,
    #[tabled(rename = "Commission")]
    commission: String,
    #[tabled(rename = "Overlaps")]
    overlaps: usize,
    #[tabled(rename = "Overdue")]
    overdue: usize,
    #[tabled(rename = "Idle min")]
    idle_gap_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct LessonLine {
    #[tabled(rename = "Lesson")]
    lesson: String,
    #[tabled(rename = "Sessions")]
    engagements: usize,
    #[tabled(rename = "Minutes")]
    minutes: u64,
    #[tabled(rename = "Revenue")]
    revenue: String,
    #[tabled(rename = "Commission")]
    commission: String,
    #[tabled(rename = "Profit")]
    profit: String,
}

impl StatsCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        let day = ctx.open(&self.feed.path)?;
        let stats = day.coordinator.statistics();

        if ctx.format == OutputFormat::Json {
            print_single(&stats);
            return Ok(());
        }

        if self.by_lesson {
            print_output(&lesson_lines(&stats), ctx.format);
        } else {
            print_output(&instructor_lines(&day, &stats), ctx.format);
        }
        print_info(&format!(
            "{} sessions, {} min (avg {:.1}); revenue {}, commission {}, profit {}",
            stats.engagements,
            stats.total_minutes,
            stats.average_minutes,
            stats.totals.revenue,
            stats.totals.commission,
            stats.totals.profit()
        ));
        Ok(())
    }
}

fn instructor_lines(day: &LoadedDay, stats: &DayStatistics) -> Vec<InstructorLine> {
    stats
        .instructors
        .iter()
        .map(|row| InstructorLine {
            instructor: day.name(&row.instructor_id),
            active: row.active,
            engagements: row.engagements,
            minutes: row.minutes,
            revenue: row.earnings.revenue.to_string(),
            commission: row.earnings.commission.to_string(),
            overlaps: row.overlaps,
            overdue: row.overdue,
            idle_gap_minutes: row.idle_gap_minutes,
        })
        .collect()
}

fn lesson_lines(stats: &DayStatistics) -> Vec<LessonLine> {
    stats
        .lessons
        .iter()
        .map(|row| LessonLine {
            lesson: row.lesson_id.short(),
            engagements: row.engagements,
            minutes: row.minutes,
            revenue: row.earnings.revenue.to_string(),
            commission: row.earnings.commission.to_string(),
            profit: row.earnings.profit().to_string(),
        })
        .collect()
}
