//! Error handling and display for the CLI.

use std::path::PathBuf;

use cadence_schedule::{ErrorClass, ScheduleError};
use colored::Colorize;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Could not read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Script line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("{0}")]
    Schedule(#[from] ScheduleError),
}

impl CliError {
    pub fn script(line: usize, message: impl Into<String>) -> Self {
        Self::Script {
            line,
            message: message.into(),
        }
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    let schedule_err = err.downcast_ref::<ScheduleError>().or_else(|| {
        match err.downcast_ref::<CliError>() {
            Some(CliError::Schedule(inner)) => Some(inner),
            _ => None,
        }
    });
    if let Some(schedule_err) = schedule_err {
        if let Some(hint) = schedule_hint(schedule_err) {
            eprintln!("\n{}", hint.yellow());
        }
        return;
    }

    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::Read { .. } => {
                eprintln!("\n{}", "Hint: Check the path and file permissions.".yellow());
            }
            CliError::Script { .. } => {
                eprintln!(
                    "\n{}",
                    "Hint: Each script line is one JSON object with an \"op\" field.".yellow()
                );
            }
            _ => {}
        }
    }
}

fn schedule_hint(err: &ScheduleError) -> Option<&'static str> {
    match err {
        ScheduleError::AxisLocked(_) => Some("Hint: Toggle the lock before propagating."),
        ScheduleError::InvalidTime(_) => Some("Hint: Times are written HH:MM, e.g. 09:30."),
        ScheduleError::OutOfBounds { .. } | ScheduleError::ShiftOutOfBounds { .. } => {
            Some("Hint: Adjust the operating day with --day-start/--day-end or CADENCE_DAY_*.")
        }
        ScheduleError::LocationNotAllowed(_) => {
            Some("Hint: Allowed locations come from CADENCE_LOCATIONS or the config file.")
        }
        _ => match err.class() {
            ErrorClass::ConfirmationTimeout | ErrorClass::FeedInconsistency => {
                Some("Hint: The local state was reverted; retry the operation.")
            }
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_schedule::Axis;

    #[test]
    fn test_hints() {
        assert!(schedule_hint(&ScheduleError::AxisLocked(Axis::Time)).is_some());
        assert!(schedule_hint(&ScheduleError::FeedInconsistency("x".into()))
            .unwrap()
            .contains("retry"));
        assert!(schedule_hint(&ScheduleError::InvalidRequiredGap(-1)).is_none());
    }
}
