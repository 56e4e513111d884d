//! Wall-clock "HH:MM" strings and minute-of-day integers.
//!
//! Everything here is pure. `to_minutes` is lenient (malformed input reads as
//! 00:00) because display code calls it on whatever it has; anything that
//! mutates a schedule goes through [`parse_hhmm`] and [`DayBounds::check`]
//! instead.

use serde::{Deserialize, Serialize};

use crate::error::{ScheduleError, ScheduleResult};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Strictly parse `H:MM` / `HH:MM` into minutes since midnight.
pub fn parse_hhmm(s: &str) -> ScheduleResult<u32> {
    let invalid = || ScheduleError::InvalidTime(s.to_string());
    let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;

    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return Err(invalid());
    }
    let hours: u32 = h.parse().map_err(|_| invalid())?;
    let minutes: u32 = m.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    Ok(hours * 60 + minutes)
}

/// Lenient conversion: malformed input yields 0.
pub fn to_minutes(hhmm: &str) -> u32 {
    parse_hhmm(hhmm).unwrap_or(0)
}

/// Format minutes since midnight as `HH:MM`, wrapping past midnight.
pub fn to_hhmm(minutes: u32) -> String {
    let m = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", m / 60, m % 60)
}

/// Shift a wall-clock time by `delta` minutes, wrapping modulo one day.
///
/// Display only: scheduling code validates against [`DayBounds`] instead.
pub fn shift(hhmm: &str, delta: i32) -> String {
    let day = MINUTES_PER_DAY as i64;
    let shifted = (to_minutes(hhmm) as i64 + delta as i64).rem_euclid(day);
    to_hhmm(shifted as u32)
}

/// The operating window `[min, max]` a start time must fall inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBounds {
    #[serde(with = "hhmm")]
    pub min: u32,
    #[serde(with = "hhmm")]
    pub max: u32,
}

impl DayBounds {
    pub fn new(min: u32, max: u32) -> ScheduleResult<Self> {
        if min > max || max >= MINUTES_PER_DAY {
            return Err(ScheduleError::InvalidConfig(format!(
                "day bounds {}-{} are not an increasing range within one day",
                to_hhmm(min),
                to_hhmm(max)
            )));
        }
        Ok(Self { min, max })
    }

    pub fn parse(min: &str, max: &str) -> ScheduleResult<Self> {
        Self::new(parse_hhmm(min)?, parse_hhmm(max)?)
    }

    pub fn contains(&self, minute: i64) -> bool {
        minute >= self.min as i64 && minute <= self.max as i64
    }

    /// Validate an unwrapped minute value and narrow it to `u32`.
    pub fn check(&self, minute: i64) -> ScheduleResult<u32> {
        if self.contains(minute) {
            Ok(minute as u32)
        } else {
            Err(ScheduleError::OutOfBounds {
                minute,
                bounds: *self,
            })
        }
    }
}

impl Default for DayBounds {
    fn default() -> Self {
        Self {
            min: 8 * 60,
            max: 20 * 60,
        }
    }
}

impl std::fmt::Display for DayBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", to_hhmm(self.min), to_hhmm(self.max))
    }
}

/// Serde adapter storing a minute-of-day as an `HH:MM` string.
pub mod hhmm {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(minutes: &u32, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::to_hhmm(*minutes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_hhmm(&s).map_err(serde::de::Error::custom)
    }
}
