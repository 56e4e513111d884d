//! Engagements and the package economics they are sold under.

use cadence_id::{BookingId, EngagementId, EquipmentId, InstructorId, LessonId};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::commission::{self, CompensationModel, Earnings};
use crate::error::{ScheduleError, ScheduleResult};
use crate::money::Money;
use crate::time;

/// Lifecycle of an engagement. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementStatus {
    #[default]
    Tentative,
    Planned,
    Completed,
}

impl EngagementStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for EngagementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Tentative => "tentative",
            Self::Planned => "planned",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Pricing and capacity of the package a lesson was sold under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageEconomics {
    pub price_per_participant: Money,
    pub participant_capacity: u32,
    pub equipment_capacity: u32,
    /// Nominal package length in minutes; revenue is prorated against it.
    pub nominal_duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_category: Option<String>,
}

/// The fields the schedule core is allowed to change.
///
/// Captured before an optimistic write so a timeout can put them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementFields {
    pub start: u32,
    pub duration: u32,
    pub location: String,
    pub status: EngagementStatus,
}

/// One time-boxed session in an instructor's queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    pub id: EngagementId,
    pub instructor_id: InstructorId,
    pub lesson_id: LessonId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
    pub date: NaiveDate,
    /// Start as minutes since midnight.
    #[serde(with = "time::hhmm")]
    pub start: u32,
    /// Length in minutes, always > 0.
    pub duration: u32,
    pub location: String,
    #[serde(default)]
    pub status: EngagementStatus,
    pub compensation: CompensationModel,
    pub package: PackageEconomics,
    pub participants: u32,
    #[serde(default)]
    pub equipment: Vec<EquipmentId>,
}

impl Engagement {
    /// Minute the engagement ends, which may run past midnight.
    pub fn end(&self) -> u32 {
        self.start + self.duration
    }

    pub fn is_pending(&self) -> bool {
        !self.status.is_completed()
    }

    pub fn start_at(&self) -> NaiveDateTime {
        let time = NaiveTime::from_num_seconds_from_midnight_opt(self.start * 60, 0)
            .unwrap_or_default();
        self.date.and_time(time)
    }

    pub fn start_hhmm(&self) -> String {
        time::to_hhmm(self.start)
    }

    pub fn revenue(&self) -> Money {
        commission::revenue(
            self.package.price_per_participant,
            self.participants,
            self.duration,
            self.package.nominal_duration,
        )
    }

    pub fn earnings(&self) -> Earnings {
        let revenue = self.revenue();
        Earnings {
            revenue,
            commission: commission::earn(self.duration, &self.compensation, revenue),
        }
    }

    pub fn fields(&self) -> EngagementFields {
        EngagementFields {
            start: self.start,
            duration: self.duration,
            location: self.location.clone(),
            status: self.status,
        }
    }

    pub(crate) fn restore(&mut self, fields: EngagementFields) {
        self.start = fields.start;
        self.duration = fields.duration;
        self.location = fields.location;
        self.status = fields.status;
    }

    /// Structural checks that do not depend on the queue it goes into.
    pub fn validate(&self) -> ScheduleResult<()> {
        if self.duration == 0 {
            return Err(ScheduleError::ZeroDuration(self.id));
        }
        self.compensation.validate()?;
        if self.participants > self.package.participant_capacity {
            return Err(ScheduleError::CapacityExceeded {
                engagement_id: self.id,
                what: "participant",
                used: self.participants as usize,
                capacity: self.package.participant_capacity,
            });
        }
        if self.equipment.len() > self.package.equipment_capacity as usize {
            return Err(ScheduleError::CapacityExceeded {
                engagement_id: self.id,
                what: "equipment",
                used: self.equipment.len(),
                capacity: self.package.equipment_capacity,
            });
        }
        Ok(())
    }

    pub(crate) fn ensure_editable(&self) -> ScheduleResult<()> {
        if self.status.is_completed() {
            return Err(ScheduleError::CompletedImmutable(self.id));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    pub fn package() -> PackageEconomics {
        PackageEconomics {
            price_per_participant: Money::from_units(80),
            participant_capacity: 4,
            equipment_capacity: 4,
            nominal_duration: 60,
            equipment_category: Some("board".into()),
        }
    }

    /// A planned, fixed-rate engagement at `start` (`HH:MM`) for `duration` minutes.
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
            package: package(),
            participants: 2,
            equipment: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_status_is_ordered() {
        assert!(EngagementStatus::Tentative < EngagementStatus::Planned);
        assert!(EngagementStatus::Planned < EngagementStatus::Completed);
    }

    #[test]
    fn test_start_at_and_end() {
        let e = engagement(InstructorId::new(), "11:00", 45);
        assert_eq!(e.end(), 11 * 60 + 45);
        assert_eq!(e.start_at().to_string(), "2026-03-14 11:00:00");
        assert_eq!(e.start_hhmm(), "11:00");
    }

    #[test]
    fn test_validate_capacity() {
        let mut e = engagement(InstructorId::new(), "11:00", 45);
        e.participants = 5;
        assert!(matches!(
            e.validate(),
            Err(ScheduleError::CapacityExceeded { what: "participant", .. })
        ));

        let mut e = engagement(InstructorId::new(), "11:00", 45);
        e.equipment = (0..5).map(|_| EquipmentId::new()).collect();
        assert!(matches!(
            e.validate(),
            Err(ScheduleError::CapacityExceeded { what: "equipment", .. })
        ));

        let mut e = engagement(InstructorId::new(), "11:00", 45);
        e.duration = 0;
        assert!(matches!(e.validate(), Err(ScheduleError::ZeroDuration(_))));
    }

    #[test]
    fn test_feed_record_json() {
        let json = serde_json::json!({
            "id": EngagementId::new(),
            "instructor_id": InstructorId::new(),
            "lesson_id": LessonId::new(),
            "date": "2026-03-14",
            "start": "09:30",
            "duration": 90,
            "location": "Harbour",
            "status": "tentative",
            "compensation": { "model": "percentage", "rate_percent": 25.0 },
            "package": {
                "price_per_participant": 120.0,
                "participant_capacity": 6,
                "equipment_capacity": 6,
                "nominal_duration": 120
            },
            "participants": 3
        });
        let e: Engagement = serde_json::from_value(json).unwrap();
        assert_eq!(e.start, 570);
        assert_eq!(e.status, EngagementStatus::Tentative);
        assert!(e.equipment.is_empty());
        // 120 × 3 × 90/120 = 270, 25% = 67.50
        assert_eq!(e.earnings().revenue, Money::from_units(270));
        assert_eq!(e.earnings().commission, Money::from_micros(67_500_000));
    }
}
