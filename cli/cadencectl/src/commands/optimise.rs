//! Close gaps in every active queue.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::error::CliError;
use crate::output::{print_info, print_single, print_success, print_warning, OutputFormat};

use super::{CommandContext, FeedArgs};

#[derive(Debug, Args)]
pub struct OptimiseCommand {
    #[command(flatten)]
    feed: FeedArgs,

    /// Change the required gap by this many minutes first.
    #[arg(long, allow_hyphen_values = true)]
    gap_delta: Option<i32>,

    /// Write the optimised day to this path.
    #[arg(long, value_name = "PATH")]
    write: Option<PathBuf>,
}

impl OptimiseCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        let mut day = ctx.open(&self.feed.path)?;
        if let Some(delta) = self.gap_delta {
            day.coordinator
                .update_required_gap(delta)
                .map_err(CliError::from)?;
        }

        let summary = day.coordinator.optimise_all_queues();
        match ctx.format {
            OutputFormat::Json => print_single(&summary),
            OutputFormat::Table => {
                print_success(&format!(
                    "Moved {} engagement(s) across {} queue(s) with a {} minute gap",
                    summary.moved,
                    summary.queues,
                    day.coordinator.required_gap()
                ));
                if summary.blocked > 0 {
                    print_info(&format!(
                        "{} engagement(s) could not move without leaving the day or colliding",
                        summary.blocked
                    ));
                }
            }
        }
        if summary.overlaps > 0 {
            print_warning(&format!("{} overlap(s) left in place", summary.overlaps));
        }

        if let Some(path) = &self.write {
            day.write_snapshot(path)?;
            if ctx.format == OutputFormat::Table {
                print_info(&format!("Wrote {}", path.display()));
            }
        }
        Ok(())
    }
}
