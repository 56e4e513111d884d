//! One instructor's ordered engagements for one day.
//!
//! Every mutation validates first and then applies, so a refused call leaves
//! the queue untouched. Mutations return the pre-change fields of each
//! engagement they touched; the coordinator uses those as rollback snapshots.

use cadence_id::{EngagementId, InstructorId};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::engagement::{Engagement, EngagementFields, EngagementStatus};
use crate::error::{ScheduleError, ScheduleResult};
use crate::gap::{self, GapRecord};
use crate::time::DayBounds;

/// Pre-change fields of every engagement a mutation touched.
pub type Touched = Vec<(EngagementId, EngagementFields)>;

/// Result of closing gaps in one queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueOptimisation {
    /// Engagements moved, with their previous fields.
    #[serde(skip)]
    pub touched: Touched,

    /// Overlaps left in place.
    pub overlaps: usize,

    /// Correctable positions that could not move without leaving the day or
    /// running into the next engagement.
    pub blocked: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstructorQueue {
    instructor_id: InstructorId,
    day: NaiveDate,
    #[serde(skip)]
    bounds: DayBounds,
    active: bool,
    /// Held queues are skipped when the shared proposal is propagated.
    held: bool,
    engagements: Vec<Engagement>,
}

impl InstructorQueue {
    pub fn new(instructor_id: InstructorId, day: NaiveDate, bounds: DayBounds) -> Self {
        Self {
            instructor_id,
            day,
            bounds,
            active: true,
            held: false,
            engagements: Vec::new(),
        }
    }

    pub fn instructor_id(&self) -> InstructorId {
        self.instructor_id
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn bounds(&self) -> DayBounds {
        self.bounds
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn engagements(&self) -> &[Engagement] {
        &self.engagements
    }

    pub fn len(&self) -> usize {
        self.engagements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engagements.is_empty()
    }

    pub fn get(&self, id: &EngagementId) -> Option<&Engagement> {
        self.engagements.iter().find(|e| &e.id == id)
    }

    pub fn contains(&self, id: &EngagementId) -> bool {
        self.get(id).is_some()
    }

    /// First engagement that is not completed.
    pub fn next_pending(&self) -> Option<&Engagement> {
        self.engagements.iter().find(|e| e.is_pending())
    }

    pub fn has_pending(&self) -> bool {
        self.next_pending().is_some()
    }

    /// Returns true if the flag changed.
    pub fn set_active(&mut self, active: bool) -> bool {
        std::mem::replace(&mut self.active, active) != active
    }

    /// Returns true if the flag changed.
    pub fn set_held(&mut self, held: bool) -> bool {
        std::mem::replace(&mut self.held, held) != held
    }

    /// Insert keeping start times strictly ascending.
    pub fn insert(&mut self, engagement: Engagement) -> ScheduleResult<()> {
        if !self.active {
            return Err(ScheduleError::QueueInactive(self.instructor_id));
        }
        self.load(engagement)
    }

    /// Insert a record the feed already holds, regardless of the active flag.
    pub(crate) fn load(&mut self, engagement: Engagement) -> ScheduleResult<()> {
        self.admit(&engagement)?;
        self.place(engagement);
        Ok(())
    }

    /// Checks shared by insertion and feed replacement.
    fn admit(&self, engagement: &Engagement) -> ScheduleResult<()> {
        if engagement.instructor_id != self.instructor_id {
            return Err(ScheduleError::WrongQueue {
                engagement_id: engagement.id,
                expected: self.instructor_id.to_string(),
                actual: engagement.instructor_id.to_string(),
            });
        }
        if engagement.date != self.day {
            return Err(ScheduleError::WrongQueue {
                engagement_id: engagement.id,
                expected: self.day.to_string(),
                actual: engagement.date.to_string(),
            });
        }
        engagement.validate()?;
        self.bounds.check(engagement.start as i64)?;
        if self.contains(&engagement.id) {
            return Err(ScheduleError::DuplicateEngagement(engagement.id));
        }
        self.ensure_start_free(engagement.start, None)
    }

    fn ensure_start_free(&self, start: u32, except: Option<&EngagementId>) -> ScheduleResult<()> {
        let taken = self
            .engagements
            .iter()
            .any(|e| e.start == start && Some(&e.id) != except);
        if taken {
            return Err(ScheduleError::DuplicateStart {
                instructor_id: self.instructor_id,
                start,
            });
        }
        Ok(())
    }

    fn place(&mut self, engagement: Engagement) {
        let at = self
            .engagements
            .partition_point(|e| e.start < engagement.start);
        self.engagements.insert(at, engagement);
    }

    fn resort(&mut self) {
        self.engagements.sort_by_key(|e| e.start);
    }

    /// Gap record for every position.
    pub fn audit_gaps(&self, required_gap: u32) -> Vec<GapRecord> {
        gap::audit(&self.engagements, required_gap)
    }

    /// Move every pending engagement by `delta` minutes.
    ///
    /// Completed engagements stay put. Refused as a whole if any new start
    /// leaves the day or the result would no longer be strictly ascending.
    pub fn shift_all(&mut self, delta: i32) -> ScheduleResult<Touched> {
        if delta == 0 {
            return Ok(Vec::new());
        }

        let mut starts = Vec::with_capacity(self.engagements.len());
        for e in &self.engagements {
            if e.is_pending() {
                let minute = e.start as i64 + delta as i64;
                if !self.bounds.contains(minute) {
                    return Err(ScheduleError::ShiftOutOfBounds {
                        instructor_id: self.instructor_id,
                        minute,
                        bounds: self.bounds,
                    });
                }
                starts.push(minute as u32);
            } else {
                starts.push(e.start);
            }
        }
        if starts.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ScheduleError::OrderViolation {
                instructor_id: self.instructor_id,
            });
        }

        let mut touched = Vec::new();
        for (e, start) in self.engagements.iter_mut().zip(starts) {
            if e.start != start {
                touched.push((e.id, e.fields()));
                e.start = start;
            }
        }
        debug!(
            instructor_id = %self.instructor_id,
            delta,
            moved = touched.len(),
            "Shifted queue"
        );
        Ok(touched)
    }

    /// Set the location of every pending engagement.
    pub fn set_location(&mut self, location: &str) -> ScheduleResult<Touched> {
        let mut touched = Vec::new();
        for e in self.engagements.iter_mut().filter(|e| e.is_pending()) {
            if e.location != location {
                touched.push((e.id, e.fields()));
                e.location = location.to_string();
            }
        }
        Ok(touched)
    }

    fn editable(&mut self, id: &EngagementId) -> ScheduleResult<&mut Engagement> {
        let engagement = self
            .engagements
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or(ScheduleError::UnknownEngagement(*id))?;
        engagement.ensure_editable()?;
        Ok(engagement)
    }

    /// Move one engagement; the queue is re-sorted afterwards.
    pub fn set_start(&mut self, id: &EngagementId, start: u32) -> ScheduleResult<Touched> {
        self.bounds.check(start as i64)?;
        self.ensure_start_free(start, Some(id))?;
        let engagement = self.editable(id)?;
        if engagement.start == start {
            return Ok(Vec::new());
        }
        let touched = vec![(engagement.id, engagement.fields())];
        engagement.start = start;
        self.resort();
        Ok(touched)
    }

    pub fn set_duration(&mut self, id: &EngagementId, duration: u32) -> ScheduleResult<Touched> {
        if duration == 0 {
            return Err(ScheduleError::ZeroDuration(*id));
        }
        let engagement = self.editable(id)?;
        if engagement.duration == duration {
            return Ok(Vec::new());
        }
        let touched = vec![(engagement.id, engagement.fields())];
        engagement.duration = duration;
        Ok(touched)
    }

    pub fn set_location_of(&mut self, id: &EngagementId, location: &str) -> ScheduleResult<Touched> {
        let engagement = self.editable(id)?;
        if engagement.location == location {
            return Ok(Vec::new());
        }
        let touched = vec![(engagement.id, engagement.fields())];
        engagement.location = location.to_string();
        Ok(touched)
    }

    /// Move an engagement forward in its lifecycle. Regressions are refused.
    pub fn advance_status(&mut self, id: &EngagementId, status: EngagementStatus) -> ScheduleResult<Touched> {
        let engagement = self.editable(id)?;
        if status < engagement.status {
            return Err(ScheduleError::StatusRegression {
                engagement_id: engagement.id,
                from: engagement.status,
                to: status,
            });
        }
        if status == engagement.status {
            return Ok(Vec::new());
        }
        let touched = vec![(engagement.id, engagement.fields())];
        engagement.status = status;
        Ok(touched)
    }

    /// External cancellation.
    pub fn remove(&mut self, id: &EngagementId) -> ScheduleResult<Engagement> {
        let at = self
            .engagements
            .iter()
            .position(|e| &e.id == id)
            .ok_or(ScheduleError::UnknownEngagement(*id))?;
        Ok(self.engagements.remove(at))
    }

    /// Replace an engagement with the feed's version of it.
    ///
    /// With `keep_local`, the fields the core owns are kept from the local copy
    /// (an optimistic write is still in flight) and only the rest is taken from
    /// the feed. Returns true if anything changed.
    pub(crate) fn replace(&mut self, incoming: Engagement, keep_local: bool) -> ScheduleResult<bool> {
        let Some(at) = self.engagements.iter().position(|e| e.id == incoming.id) else {
            return Err(ScheduleError::UnknownEngagement(incoming.id));
        };
        let mut next = incoming;
        if keep_local {
            next.restore(self.engagements[at].fields());
        }
        if next == self.engagements[at] {
            return Ok(false);
        }

        let current = self.engagements.remove(at);
        if let Err(err) = self.admit(&next) {
            self.engagements.insert(at, current);
            return Err(err);
        }
        self.place(next);
        Ok(true)
    }

    /// Put back fields captured before an optimistic write.
    ///
    /// Restores exactly, even if another engagement has since taken the old
    /// start; returns false in that case so the caller can report it.
    pub(crate) fn restore(&mut self, id: &EngagementId, fields: EngagementFields) -> ScheduleResult<bool> {
        let start = fields.start;
        let engagement = self
            .engagements
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or(ScheduleError::UnknownEngagement(*id))?;
        engagement.restore(fields);
        self.resort();
        Ok(self.ensure_start_free(start, Some(id)).is_ok())
    }

    /// Close gaps and overdue spacing so each pending engagement starts exactly
    /// `required_gap` after its predecessor ends.
    ///
    /// Overlaps and completed engagements are never moved. A move that would
    /// leave the day, or make the engagement run into its successor, is skipped.
    /// Passes repeat until nothing moves, so the result is a fixed point and a
    /// second call changes nothing.
    pub fn optimise(&mut self, required_gap: u32) -> QueueOptimisation {
        let before: Vec<EngagementFields> = self.engagements.iter().map(Engagement::fields).collect();
        let len = self.engagements.len();

        for _ in 0..=len {
            let mut moved = false;
            for i in 1..len {
                let current = &self.engagements[i];
                if !current.is_pending() {
                    continue;
                }
                let record = gap::classify(&self.engagements[i - 1], current, required_gap);
                if !record.state.is_correctable() {
                    continue;
                }
                let target = self.engagements[i - 1].end() + required_gap;
                if !self.fits(i, target) {
                    continue;
                }
                self.engagements[i].start = target;
                moved = true;
            }
            if !moved {
                break;
            }
        }

        let mut outcome = QueueOptimisation::default();
        for (e, old) in self.engagements.iter().zip(before) {
            if e.start != old.start {
                outcome.touched.push((e.id, old));
            }
        }
        for (i, record) in self.audit_gaps(required_gap).iter().enumerate() {
            match record.state {
                gap::GapState::Overlap => outcome.overlaps += 1,
                state if state.is_correctable() && self.engagements[i].is_pending() => {
                    outcome.blocked += 1
                }
                _ => {}
            }
        }
        outcome
    }

    fn fits(&self, index: usize, target: u32) -> bool {
        if !self.bounds.contains(target as i64) {
            return false;
        }
        match self.engagements.get(index + 1) {
            Some(next) => target + self.engagements[index].duration <= next.start,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engagement::fixtures::{day, engagement};
    use crate::gap::GapState;
    use crate::time::to_minutes;
    use proptest::prelude::*;

    fn queue_with(ins: InstructorId, slots: &[(&str, u32)]) -> InstructorQueue {
        let mut q = InstructorQueue::new(ins, day(), DayBounds::default());
        for (start, duration) in slots {
            q.insert(engagement(ins, start, *duration)).unwrap();
        }
        q
    }

    fn starts(q: &InstructorQueue) -> Vec<String> {
        q.engagements().iter().map(Engagement::start_hhmm).collect()
    }

    #[test]
    fn test_insert_keeps_order() {
        let ins = InstructorId::new();
        let q = queue_with(ins, &[("11:00", 60), ("09:00", 60), ("10:00", 30)]);
        assert_eq!(starts(&q), vec!["09:00", "10:00", "11:00"]);
    }

    #[test]
    fn test_insert_refused_when_inactive() {
        let ins = InstructorId::new();
        let mut q = queue_with(ins, &[]);
        assert!(q.set_active(false));
        let err = q.insert(engagement(ins, "09:00", 60)).unwrap_err();
        assert!(matches!(err, ScheduleError::QueueInactive(_)));
        assert!(q.is_empty());
    }

    #[test]
    fn test_insert_rejects_duplicate_start_and_foreign_engagement() {
        let ins = InstructorId::new();
        let mut q = queue_with(ins, &[("09:00", 60)]);
        assert!(matches!(
            q.insert(engagement(ins, "09:00", 30)),
            Err(ScheduleError::DuplicateStart { .. })
        ));
        assert!(matches!(
            q.insert(engagement(InstructorId::new(), "10:00", 30)),
            Err(ScheduleError::WrongQueue { .. })
        ));
        assert!(matches!(
            q.insert(engagement(ins, "07:00", 30)),
            Err(ScheduleError::OutOfBounds { .. })
        ));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_shift_all_is_all_or_nothing() {
        let ins = InstructorId::new();
        let mut q = queue_with(ins, &[("09:00", 60), ("19:30", 30)]);

        let err = q.shift_all(45).unwrap_err();
        assert!(matches!(err, ScheduleError::ShiftOutOfBounds { minute: 1215, .. }));
        assert_eq!(starts(&q), vec!["09:00", "19:30"]);

        let touched = q.shift_all(-30).unwrap();
        assert_eq!(touched.len(), 2);
        assert_eq!(touched[0].1.start, to_minutes("09:00"));
        assert_eq!(starts(&q), vec!["08:30", "19:00"]);
    }

    #[test]
    fn test_shift_all_skips_completed_and_keeps_order() {
        let ins = InstructorId::new();
        let mut q = queue_with(ins, &[("09:00", 60), ("10:15", 60)]);
        let first = q.engagements()[0].id;
        q.advance_status(&first, EngagementStatus::Completed).unwrap();

        assert!(matches!(
            q.shift_all(-90),
            Err(ScheduleError::OrderViolation { .. })
        ));
        q.shift_all(15).unwrap();
        assert_eq!(starts(&q), vec!["09:00", "10:30"]);
    }

    #[test]
    fn test_set_location_skips_completed() {
        let ins = InstructorId::new();
        let mut q = queue_with(ins, &[("09:00", 60), ("10:15", 60)]);
        let first = q.engagements()[0].id;
        q.advance_status(&first, EngagementStatus::Completed).unwrap();

        let touched = q.set_location("Harbour").unwrap();
        assert_eq!(touched.len(), 1);
        assert_eq!(q.engagements()[0].location, "North Beach");
        assert_eq!(q.engagements()[1].location, "Harbour");
    }

    #[test]
    fn test_completed_is_immutable() {
        let ins = InstructorId::new();
        let mut q = queue_with(ins, &[("09:00", 60)]);
        let id = q.engagements()[0].id;
        q.advance_status(&id, EngagementStatus::Completed).unwrap();

        assert!(matches!(
            q.set_start(&id, 600),
            Err(ScheduleError::CompletedImmutable(_))
        ));
        assert!(matches!(
            q.set_duration(&id, 30),
            Err(ScheduleError::CompletedImmutable(_))
        ));
        assert!(q.next_pending().is_none());
    }

    #[test]
    fn test_status_cannot_regress() {
        let ins = InstructorId::new();
        let mut q = queue_with(ins, &[("09:00", 60)]);
        let id = q.engagements()[0].id;
        let err = q.advance_status(&id, EngagementStatus::Tentative).unwrap_err();
        assert!(matches!(err, ScheduleError::StatusRegression { .. }));
    }

    #[test]
    fn test_set_start_resorts() {
        let ins = InstructorId::new();
        let mut q = queue_with(ins, &[("09:00", 60), ("11:00", 60)]);
        let first = q.engagements()[0].id;
        q.set_start(&first, to_minutes("12:30")).unwrap();
        assert_eq!(starts(&q), vec!["11:00", "12:30"]);
        assert_eq!(q.engagements()[1].id, first);
    }

    #[test]
    fn test_optimise_closes_gap_and_overdue() {
        let ins = InstructorId::new();
        // 09:00-10:00, then 10:40 (gap 25), then 11:45
        let mut q = queue_with(ins, &[("09:00", 60), ("10:40", 60), ("11:45", 30)]);
        let outcome = q.optimise(15);

        assert_eq!(starts(&q), vec!["09:00", "10:15", "11:30"]);
        assert_eq!(outcome.touched.len(), 2);
        assert_eq!(outcome.overlaps, 0);
        assert!(q.audit_gaps(15).iter().all(|r| r.state == GapState::None));
    }

    #[test]
    fn test_optimise_leaves_overlap() {
        let ins = InstructorId::new();
        let mut q = queue_with(ins, &[("09:00", 60), ("09:30", 30)]);
        let outcome = q.optimise(15);
        assert_eq!(starts(&q), vec!["09:00", "09:30"]);
        assert_eq!(outcome.overlaps, 1);
        assert!(outcome.touched.is_empty());
    }

    #[test]
    fn test_optimise_does_not_run_into_successor() {
        let ins = InstructorId::new();
        // second is overdue by 10 but only 5 minutes before the third
        let mut q = queue_with(ins, &[("09:00", 60), ("10:05", 5), ("10:15", 30)]);
        q.optimise(15);
        let records = q.audit_gaps(15);
        assert!(records.iter().all(|r| r.state != GapState::Overlap));
        assert_eq!(starts(&q), vec!["09:00", "10:15", "10:35"]);
    }

    fn overlap_free_queue() -> impl Strategy<Value = Vec<(u32, u32)>> {
        proptest::collection::vec((0u32..40, 5u32..60), 1..8).prop_map(|slots| {
            let mut cursor = 8 * 60;
            slots
                .into_iter()
                .map(|(idle, duration)| {
                    let start = cursor + idle;
                    cursor = start + duration;
                    (start, duration)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_optimise_is_idempotent(slots in overlap_free_queue(), gap in 0u32..30) {
            let ins = InstructorId::new();
            let mut q = InstructorQueue::new(ins, day(), DayBounds::new(8 * 60, 20 * 60).unwrap());
            for (start, duration) in &slots {
                let mut e = engagement(ins, "08:00", *duration);
                e.start = *start;
                q.insert(e).unwrap();
            }

            q.optimise(gap);
            let once = q.clone();
            let second = q.optimise(gap);

            prop_assert!(second.touched.is_empty());
            prop_assert_eq!(q, once);
        }

        #[test]
        fn prop_optimise_never_creates_overlap(slots in overlap_free_queue(), gap in 0u32..30) {
            let ins = InstructorId::new();
            let mut q = InstructorQueue::new(ins, day(), DayBounds::new(8 * 60, 20 * 60).unwrap());
            for (start, duration) in &slots {
                let mut e = engagement(ins, "08:00", *duration);
                e.start = *start;
                q.insert(e).unwrap();
            }

            let outcome = q.optimise(gap);
            prop_assert_eq!(outcome.overlaps, 0);
            let ascending = q.engagements().windows(2).all(|w| w[0].start < w[1].start);
            prop_assert!(ascending);
        }
    }
}
