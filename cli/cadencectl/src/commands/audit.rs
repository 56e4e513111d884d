//! Gap audit across every queue.

use anyhow::Result;
use cadence_schedule::time::to_hhmm;
use cadence_schedule::GapState;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_info, print_output, OutputFormat};

use super::{CommandContext, FeedArgs, LoadedDay};

#[derive(Debug, Args)]
pub struct AuditCommand {
    #[command(flatten)]
    feed: FeedArgs,

    /// Only list engagements that are not exactly on time.
    #[arg(long)]
    issues_only: bool,
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct AuditRow {
    #[tabled(rename = "Instructor")]
    instructor: String,

    #[tabled(rename = "Engagement")]
    engagement_id: String,

    #[tabled(rename = "Start")]
    start: String,

    #[tabled(rename = "End")]
    end: String,

    #[tabled(rename = "Location")]
    location: String,

    #[tabled(rename = "Status")]
    status: String,

    #[tabled(rename = "Timing")]
    timing: GapState,

    #[tabled(rename = "Minutes")]
    minutes: u32,
}

impl AuditCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        let day = ctx.open(&self.feed.path)?;
        let rows = audit_rows(&day, self.issues_only);

        print_output(&rows, ctx.format);
        if ctx.format == OutputFormat::Table {
            let overlaps = rows.iter().filter(|r| r.timing == GapState::Overlap).count();
            if overlaps > 0 {
                print_info(&format!("{overlaps} overlap(s) need manual attention"));
            }
        }
        Ok(())
    }
}

fn audit_rows(day: &LoadedDay, issues_only: bool) -> Vec<AuditRow> {
    let required_gap = day.coordinator.required_gap();
    let mut rows = Vec::new();
    for queue in day.coordinator.queues() {
        let name = day.name(&queue.instructor_id());
        let records = queue.audit_gaps(required_gap);
        for (engagement, record) in queue.engagements().iter().zip(records) {
            if issues_only && record.state == GapState::None {
                continue;
            }
            rows.push(AuditRow {
                instructor: name.clone(),
                engagement_id: engagement.id.short(),
                start: engagement.start_hhmm(),
                end: to_hhmm(engagement.end()),
                location: engagement.location.clone(),
                status: engagement.status.to_string(),
                timing: record.state,
                minutes: record.magnitude,
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::loaded;

    #[test]
    fn test_audit_rows() {
        let dir = tempfile::tempdir().unwrap();
        let day = loaded(&dir);

        let rows = audit_rows(&day, false);
        assert_eq!(rows.len(), 3);

        // Only Ana's 10:40 is off: 10:00 + 15 = 10:15, so a 25 minute gap.
        let issues = audit_rows(&day, true);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].instructor, "Ana");
        assert_eq!(issues[0].timing, GapState::Gap);
        assert_eq!(issues[0].minutes, 25);
    }
}
