//! Read-only rollups for one operating day.

use std::collections::BTreeMap;

use cadence_id::{InstructorId, LessonId};
use chrono::NaiveDate;
use serde::Serialize;

use crate::commission::{self, Earnings};
use crate::engagement::{Engagement, EngagementStatus};
use crate::gap::GapState;
use crate::queue::InstructorQueue;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub tentative: usize,
    pub planned: usize,
    pub completed: usize,
}

impl StatusCounts {
    fn record(&mut self, status: EngagementStatus) {
        match status {
            EngagementStatus::Tentative => self.tentative += 1,
            EngagementStatus::Planned => self.planned += 1,
            EngagementStatus::Completed => self.completed += 1,
        }
    }
}

/// One instructor's totals and timing health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstructorRow {
    pub instructor_id: InstructorId,
    pub active: bool,
    pub engagements: usize,
    pub minutes: u64,
    pub earnings: Earnings,
    pub overlaps: usize,
    pub overdue: usize,
    /// Minutes beyond the required gap, summed over the queue.
    pub idle_gap_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonRow {
    pub lesson_id: LessonId,
    pub engagements: usize,
    pub minutes: u64,
    pub earnings: Earnings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayStatistics {
    pub day: NaiveDate,
    pub required_gap: u32,
    pub engagements: usize,
    pub by_status: StatusCounts,
    pub total_minutes: u64,
    /// Zero when there are no engagements.
    pub average_minutes: f64,
    pub totals: Earnings,
    pub instructors: Vec<InstructorRow>,
    pub lessons: Vec<LessonRow>,
}

/// Summarise every queue for the day.
///
/// Totals are sums of per-engagement amounts, so the instructor rows, the
/// lesson rows and `totals` always agree.
pub fn summarize<'a>(
    day: NaiveDate,
    queues: impl IntoIterator<Item = &'a InstructorQueue>,
    required_gap: u32,
) -> DayStatistics {
    let mut by_status = StatusCounts::default();
    let mut instructors = Vec::new();
    let mut all: Vec<&Engagement> = Vec::new();

    for queue in queues {
        let mut row = InstructorRow {
            instructor_id: queue.instructor_id(),
            active: queue.is_active(),
            engagements: queue.len(),
            minutes: queue.engagements().iter().map(|e| e.duration as u64).sum(),
            earnings: commission::total(queue.engagements()),
            overlaps: 0,
            overdue: 0,
            idle_gap_minutes: 0,
        };
        for record in queue.audit_gaps(required_gap) {
            match record.state {
                GapState::Overlap => row.overlaps += 1,
                GapState::Overdue => row.overdue += 1,
                GapState::Gap => row.idle_gap_minutes += record.magnitude as u64,
                GapState::None => {}
            }
        }
        for engagement in queue.engagements() {
            by_status.record(engagement.status);
            all.push(engagement);
        }
        instructors.push(row);
    }

    let lessons = lesson_rows(&all);
    let total_minutes: u64 = all.iter().map(|e| e.duration as u64).sum();
    let average_minutes = if all.is_empty() {
        0.0
    } else {
        total_minutes as f64 / all.len() as f64
    };

    DayStatistics {
        day,
        required_gap,
        engagements: all.len(),
        by_status,
        total_minutes,
        average_minutes,
        totals: commission::total(all.iter().copied()),
        instructors,
        lessons,
    }
}

fn lesson_rows(engagements: &[&Engagement]) -> Vec<LessonRow> {
    let mut rows: BTreeMap<LessonId, LessonRow> = BTreeMap::new();
    for engagement in engagements {
        let row = rows.entry(engagement.lesson_id).or_insert_with(|| LessonRow {
            lesson_id: engagement.lesson_id,
            engagements: 0,
            minutes: 0,
            earnings: Earnings::default(),
        });
        row.engagements += 1;
        row.minutes += engagement.duration as u64;
        row.earnings += engagement.earnings();
    }
    rows.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engagement::fixtures::{day, engagement};
    use crate::money::Money;
    use crate::time::DayBounds;

    fn queue_with(instructor: InstructorId, slots: &[(&str, u32)]) -> InstructorQueue {
        let mut queue = InstructorQueue::new(instructor, day(), DayBounds::default());
        for (start, duration) in slots {
            queue.insert(engagement(instructor, start, *duration)).unwrap();
        }
        queue
    }

    #[test]
    fn test_empty_day() {
        let stats = summarize(day(), Vec::<&InstructorQueue>::new(), 15);
        assert_eq!(stats.engagements, 0);
        assert_eq!(stats.average_minutes, 0.0);
        assert_eq!(stats.totals, Earnings::default());
        assert!(stats.instructors.is_empty());
    }

    #[test]
    fn test_rollup() {
        let a = InstructorId::new();
        let b = InstructorId::new();
        // a: 09:00-10:00, 10:30 (gap 15), 11:15 overlaps 10:30-11:30
        let queue_a = queue_with(a, &[("09:00", 60), ("10:30", 60), ("11:15", 30)]);
        // b: 09:00-09:30, 09:40 (overdue 5)
        let queue_b = queue_with(b, &[("09:00", 30), ("09:40", 30)]);

        let stats = summarize(day(), [&queue_a, &queue_b], 15);

        assert_eq!(stats.engagements, 5);
        assert_eq!(stats.by_status.planned, 5);
        assert_eq!(stats.total_minutes, 210);
        assert_eq!(stats.average_minutes, 42.0);

        let row_a = &stats.instructors[0];
        assert_eq!(row_a.instructor_id, a);
        assert_eq!(row_a.overlaps, 1);
        assert_eq!(row_a.idle_gap_minutes, 15);
        assert_eq!(stats.instructors[1].overdue, 1);

        // 210 minutes at 160/h revenue and 30/h commission
        assert_eq!(stats.totals.revenue, Money::from_units(560));
        assert_eq!(stats.totals.commission, Money::from_units(105));
        assert_eq!(stats.totals.profit(), Money::from_units(455));
    }

    #[test]
    fn test_rows_add_up_to_totals() {
        let a = InstructorId::new();
        let b = InstructorId::new();
        let queue_a = queue_with(a, &[("08:00", 45), ("09:00", 90), ("13:00", 20)]);
        let queue_b = queue_with(b, &[("10:00", 75)]);

        let stats = summarize(day(), [&queue_a, &queue_b], 10);

        let by_instructor: Earnings = stats.instructors.iter().map(|r| r.earnings).sum();
        let by_lesson: Earnings = stats.lessons.iter().map(|r| r.earnings).sum();
        assert_eq!(by_instructor, stats.totals);
        assert_eq!(by_lesson, stats.totals);
        assert_eq!(stats.lessons.len(), 4);
    }
}
