//! Coordinator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ScheduleError, ScheduleResult};
use crate::time::{parse_hhmm, DayBounds};

/// Settings fixed for one coordinator session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Minimum spacing between consecutive engagements, in minutes.
    pub required_gap: u32,

    /// Operating window start times must fall inside.
    pub bounds: DayBounds,

    /// Location vocabulary. Empty accepts any non-blank label.
    pub locations: Vec<String>,

    /// How long an optimistic write may wait for acknowledgment.
    pub confirm_timeout_ms: u64,

    /// Buffered change notices per subscriber before it starts lagging.
    pub notice_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            required_gap: 15,
            bounds: DayBounds::default(),
            locations: Vec::new(),
            confirm_timeout_ms: cadence_reconcile::DEFAULT_CONFIRM_TIMEOUT.as_millis() as u64,
            notice_capacity: 256,
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from `CADENCE_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> ScheduleResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> ScheduleResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_overrides(lookup)
    }

    /// Override the fields whose `CADENCE_*` key is present in `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> ScheduleResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("CADENCE_REQUIRED_GAP") {
            self.required_gap = raw.trim().parse().map_err(|_| {
                ScheduleError::InvalidConfig(format!("CADENCE_REQUIRED_GAP '{raw}' is not a minute count"))
            })?;
        }

        let day_start = lookup("CADENCE_DAY_START");
        let day_end = lookup("CADENCE_DAY_END");
        if day_start.is_some() || day_end.is_some() {
            let min = match day_start {
                Some(raw) => parse_hhmm(&raw)?,
                None => self.bounds.min,
            };
            let max = match day_end {
                Some(raw) => parse_hhmm(&raw)?,
                None => self.bounds.max,
            };
            self.bounds = DayBounds::new(min, max)?;
        }

        if let Some(raw) = lookup("CADENCE_LOCATIONS") {
            self.locations = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(raw) = lookup("CADENCE_CONFIRM_TIMEOUT_MS") {
            self.confirm_timeout_ms = raw.trim().parse().map_err(|_| {
                ScheduleError::InvalidConfig(format!(
                    "CADENCE_CONFIRM_TIMEOUT_MS '{raw}' is not a millisecond count"
                ))
            })?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> ScheduleResult<()> {
        DayBounds::new(self.bounds.min, self.bounds.max)?;
        if self.notice_capacity == 0 {
            return Err(ScheduleError::InvalidConfig(
                "notice_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    /// Normalise a location label against the vocabulary.
    pub fn check_location(&self, location: &str) -> ScheduleResult<String> {
        let trimmed = location.trim();
        if trimmed.is_empty() {
            return Err(ScheduleError::LocationNotAllowed(location.to_string()));
        }
        if self.locations.is_empty() {
            return Ok(trimmed.to_string());
        }
        self.locations
            .iter()
            .find(|allowed| allowed.eq_ignore_ascii_case(trimmed))
            .cloned()
            .ok_or_else(|| ScheduleError::LocationNotAllowed(trimmed.to_string()))
    }
}
