//! The shared proposal and its reconciliation against every instructor queue.
//!
//! [`ScheduleCoordinator`] is the single writer for one operating day. Every
//! mutating call runs to completion, re-derives both axis locks from the
//! queues, and only then publishes its change notices, so a subscriber always
//! reads a fully reconciled state.
//!
//! Edits to engagements are optimistic: they apply immediately and stay
//! "confirming" until a [`ConfirmationMessage`] acknowledges them or
//! [`ScheduleCoordinator::expire_confirmations`] rolls them back.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use cadence_events::{ChangeKind, ChangeNotice, ChangeScope, ConfirmationMessage, Origin};
use cadence_id::{EngagementId, InstructorId};
use cadence_reconcile::{
    reduce, AxisLock, AxisState, Expired, FeedCursor, PendingConfirmations, SyncObservation,
};
use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::config::CoordinatorConfig;
use crate::engagement::{Engagement, EngagementStatus};
use crate::error::{ScheduleError, ScheduleResult};
use crate::feed::{DayFeed, FeedInstructor, FeedReport};
use crate::notify::ChangeBus;
use crate::optimistic::{Clock, Rollback, SystemClock};
use crate::queue::{InstructorQueue, Touched};
use crate::stats::{self, DayStatistics};
use crate::time;
use crate::Axis;

/// Totals from one optimise pass over every active queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptimiseSummary {
    pub queues: usize,
    pub moved: usize,
    /// Overlaps left for the operator to resolve.
    pub overlaps: usize,
    pub blocked: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedQueue {
    pub instructor_id: InstructorId,
    pub reason: String,
}

/// Outcome of pushing the proposal into every active queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropagationSummary {
    pub applied: Vec<InstructorId>,
    /// Engagements whose fields changed.
    pub moved: usize,
    pub skipped: Vec<SkippedQueue>,
}

enum Proposal {
    Time(u32),
    Location(String),
}

enum Subject {
    Coordinator,
    Queue(InstructorId),
    Engagement(EngagementId),
}

#[derive(Debug)]
pub struct ScheduleCoordinator {
    config: CoordinatorConfig,
    day: NaiveDate,
    queues: BTreeMap<InstructorId, InstructorQueue>,

    proposed_time: Option<u32>,
    proposed_location: Option<String>,
    time_axis: AxisState,
    location_axis: AxisState,
    time_sync: SyncObservation,
    location_sync: SyncObservation,

    confirmations: PendingConfirmations<EngagementId, Rollback>,
    cursor: FeedCursor,
    bus: ChangeBus,
    clock: Arc<dyn Clock>,
}

impl ScheduleCoordinator {
    pub fn new(day: NaiveDate, config: CoordinatorConfig) -> ScheduleResult<Self> {
        Self::with_clock(day, config, Arc::new(SystemClock))
    }

    /// Create a coordinator whose confirmation deadlines follow `clock`.
    pub fn with_clock(
        day: NaiveDate,
        config: CoordinatorConfig,
        clock: Arc<dyn Clock>,
    ) -> ScheduleResult<Self> {
        config.validate()?;
        Ok(Self {
            confirmations: PendingConfirmations::new(config.confirm_timeout()),
            bus: ChangeBus::new(config.notice_capacity),
            config,
            day,
            queues: BTreeMap::new(),
            proposed_time: None,
            proposed_location: None,
            time_axis: AxisState::default(),
            location_axis: AxisState::default(),
            time_sync: SyncObservation::default(),
            location_sync: SyncObservation::default(),
            cursor: FeedCursor::default(),
            clock,
        })
    }

    /// Build a coordinator for the feed's day and load it.
    pub fn from_feed(feed: &DayFeed, config: CoordinatorConfig) -> ScheduleResult<(Self, FeedReport)> {
        let mut coordinator = Self::new(feed.day, config)?;
        let report = coordinator.reconcile_feed(feed)?;
        Ok((coordinator, report))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn required_gap(&self) -> u32 {
        self.config.required_gap
    }

    pub fn proposed_time(&self) -> Option<u32> {
        self.proposed_time
    }

    pub fn proposed_location(&self) -> Option<&str> {
        self.proposed_location.as_deref()
    }

    pub fn lock(&self, axis: Axis) -> AxisLock {
        self.axis(axis).lock
    }

    pub fn is_locked(&self, axis: Axis) -> bool {
        self.axis(axis).is_locked()
    }

    /// The observation the current lock state was derived from.
    pub fn sync(&self, axis: Axis) -> SyncObservation {
        match axis {
            Axis::Time => self.time_sync,
            Axis::Location => self.location_sync,
        }
    }

    pub fn queue(&self, instructor_id: &InstructorId) -> Option<&InstructorQueue> {
        self.queues.get(instructor_id)
    }

    pub fn queues(&self) -> impl Iterator<Item = &InstructorQueue> {
        self.queues.values()
    }

    pub fn engagement(&self, id: &EngagementId) -> Option<&Engagement> {
        self.queues.values().find_map(|q| q.get(id))
    }

    pub fn is_confirming(&self, id: &EngagementId) -> bool {
        self.confirmations.is_pending(id)
    }

    pub fn confirming(&self) -> Vec<EngagementId> {
        self.confirmations.keys().copied().collect()
    }

    /// Earliest instant at which a pending write times out.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.confirmations.next_deadline()
    }

    pub fn cursor(&self) -> &FeedCursor {
        &self.cursor
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.bus.subscribe()
    }

    pub fn statistics(&self) -> DayStatistics {
        stats::summarize(self.day, self.queues.values(), self.config.required_gap)
    }

    /// Current queues as a feed snapshot, without display names.
    pub fn snapshot(&self) -> DayFeed {
        DayFeed {
            day: self.day,
            instructors: self
                .queues
                .values()
                .map(|queue| FeedInstructor {
                    instructor_id: queue.instructor_id(),
                    name: None,
                    active: queue.is_active(),
                    engagements: queue.engagements().to_vec(),
                })
                .collect(),
        }
    }

    /// Earliest next-pending start across active queues.
    pub fn earliest_next_pending(&self) -> Option<u32> {
        self.queues
            .values()
            .filter(|q| q.is_active())
            .filter_map(InstructorQueue::next_pending)
            .map(|e| e.start)
            .min()
    }

    // =========================================================================
    // Queues and engagements
    // =========================================================================

    /// Register an empty queue. Returns false if the instructor already has one.
    pub fn add_queue(&mut self, instructor_id: InstructorId) -> bool {
        if self.queues.contains_key(&instructor_id) {
            return false;
        }
        self.queues.insert(
            instructor_id,
            InstructorQueue::new(instructor_id, self.day, self.config.bounds),
        );
        debug!(instructor_id = %instructor_id, "Queue added");
        self.commit(
            ChangeKind::QueueActivated,
            Subject::Queue(instructor_id),
            Origin::Feed,
        );
        true
    }

    /// Add a booking-derived engagement to its instructor's queue.
    #[instrument(skip(self, engagement), fields(engagement_id = %engagement.id, instructor_id = %engagement.instructor_id))]
    pub fn insert_engagement(&mut self, engagement: Engagement) -> ScheduleResult<()> {
        let id = engagement.id;
        if self.engagement(&id).is_some() {
            return Err(ScheduleError::DuplicateEngagement(id));
        }
        self.queue_mut(&engagement.instructor_id)?.insert(engagement)?;
        self.commit(ChangeKind::EngagementInserted, Subject::Engagement(id), Origin::Feed);
        Ok(())
    }

    /// Returns true if the flag changed.
    #[instrument(skip(self))]
    pub fn set_queue_active(&mut self, instructor_id: InstructorId, active: bool) -> ScheduleResult<bool> {
        if !self.queue_mut(&instructor_id)?.set_active(active) {
            return Ok(false);
        }
        info!(instructor_id = %instructor_id, active, "Queue activity changed");
        let kind = if active {
            ChangeKind::QueueActivated
        } else {
            ChangeKind::QueueDeactivated
        };
        self.commit(kind, Subject::Queue(instructor_id), Origin::Operator);
        Ok(true)
    }

    /// Hold a queue out of proposal propagation. Returns true if the flag changed.
    #[instrument(skip(self))]
    pub fn set_queue_held(&mut self, instructor_id: InstructorId, held: bool) -> ScheduleResult<bool> {
        if !self.queue_mut(&instructor_id)?.set_held(held) {
            return Ok(false);
        }
        let kind = if held {
            ChangeKind::QueueHeld
        } else {
            ChangeKind::QueueReleased
        };
        self.commit(kind, Subject::Queue(instructor_id), Origin::Operator);
        Ok(true)
    }

    pub fn move_engagement(&mut self, id: &EngagementId, start: &str) -> ScheduleResult<()> {
        let start = time::parse_hhmm(start)?;
        self.edit(id, |queue| queue.set_start(id, start))
    }

    pub fn resize_engagement(&mut self, id: &EngagementId, duration: u32) -> ScheduleResult<()> {
        self.edit(id, |queue| queue.set_duration(id, duration))
    }

    pub fn relocate_engagement(&mut self, id: &EngagementId, location: &str) -> ScheduleResult<()> {
        let location = self.config.check_location(location)?;
        self.edit(id, |queue| queue.set_location_of(id, &location))
    }

    pub fn advance_status(&mut self, id: &EngagementId, status: EngagementStatus) -> ScheduleResult<()> {
        self.edit(id, |queue| queue.advance_status(id, status))
    }

    /// External cancellation. Any pending write to the engagement is forgotten.
    #[instrument(skip(self))]
    pub fn remove_engagement(&mut self, id: &EngagementId) -> ScheduleResult<Engagement> {
        let owner = self.owner_of(id)?;
        let removed = self.queue_mut(&owner)?.remove(id)?;
        if self.confirmations.forget(id).is_ok() {
            debug!(engagement_id = %id, "Dropped pending confirmation of removed engagement");
        }
        self.commit(ChangeKind::EngagementRemoved, Subject::Engagement(*id), Origin::Feed);
        Ok(removed)
    }

    // =========================================================================
    // Shared proposal
    // =========================================================================

    /// Set the proposed time. A no-op returning `Ok(false)` while the time
    /// axis is locked or the value is unchanged.
    #[instrument(skip(self))]
    pub fn adjust_time(&mut self, hhmm: &str) -> ScheduleResult<bool> {
        if self.time_axis.is_locked() {
            debug!("Time axis locked; ignoring adjustment");
            return Ok(false);
        }
        let minute = time::parse_hhmm(hhmm)?;
        let minute = self.config.bounds.check(minute as i64)?;
        Ok(self.set_proposed_time(minute))
    }

    /// Nudge the proposed time by `step` minutes.
    ///
    /// Without a proposal the step is taken from the earliest next-pending
    /// start, or from the start of the day if nothing is pending.
    #[instrument(skip(self))]
    pub fn adjust_time_step(&mut self, step: i32) -> ScheduleResult<bool> {
        if self.time_axis.is_locked() {
            debug!("Time axis locked; ignoring step");
            return Ok(false);
        }
        let base = self
            .proposed_time
            .or_else(|| self.earliest_next_pending())
            .unwrap_or(self.config.bounds.min);
        let minute = self.config.bounds.check(base as i64 + step as i64)?;
        Ok(self.set_proposed_time(minute))
    }

    pub fn toggle_time_lock(&mut self) -> AxisLock {
        self.toggle_lock(Axis::Time)
    }

    /// Set the proposed location. A no-op returning `Ok(false)` while the
    /// location axis is locked or the value is unchanged.
    #[instrument(skip(self))]
    pub fn adjust_location(&mut self, location: &str) -> ScheduleResult<bool> {
        if self.location_axis.is_locked() {
            debug!("Location axis locked; ignoring adjustment");
            return Ok(false);
        }
        let location = self.config.check_location(location)?;
        if self.proposed_location.as_deref() == Some(location.as_str()) {
            return Ok(false);
        }
        self.proposed_location = Some(location);
        self.commit(ChangeKind::ProposalLocationChanged, Subject::Coordinator, Origin::Operator);
        Ok(true)
    }

    pub fn toggle_location_lock(&mut self) -> AxisLock {
        self.toggle_lock(Axis::Location)
    }

    /// Operator lock toggle for either axis.
    pub fn toggle_lock(&mut self, axis: Axis) -> AxisLock {
        let has_proposal = match axis {
            Axis::Time => self.proposed_time.is_some(),
            Axis::Location => self.proposed_location.is_some(),
        };
        let current = *self.axis(axis);
        let next = current.toggle(has_proposal);
        if next != current {
            *self.axis_mut(axis) = next;
            info!(axis = %axis, from = %current.lock, to = %next.lock, "Lock toggled");
            self.bus.publish(lock_kind(axis), Origin::Operator);
            // A manual unlock that suppresses nothing is cleared right away.
            let lock_changes = self.refresh();
            self.announce_locks(lock_changes);
        }
        self.axis(axis).lock
    }

    /// Change the required gap by `delta` minutes. Returns the new value.
    #[instrument(skip(self))]
    pub fn update_required_gap(&mut self, delta: i32) -> ScheduleResult<u32> {
        let target = self.config.required_gap as i64 + delta as i64;
        let gap = u32::try_from(target).map_err(|_| ScheduleError::InvalidRequiredGap(target))?;
        if gap != self.config.required_gap {
            self.config.required_gap = gap;
            self.commit(ChangeKind::RequiredGapChanged, Subject::Coordinator, Origin::Operator);
        }
        Ok(gap)
    }

    // =========================================================================
    // Bulk mutations
    // =========================================================================

    /// Close every gap and overdue spacing in every active queue.
    #[instrument(skip(self), fields(required_gap = self.config.required_gap))]
    pub fn optimise_all_queues(&mut self) -> OptimiseSummary {
        let required_gap = self.config.required_gap;
        let mut summary = OptimiseSummary::default();
        let mut moved = Vec::new();

        for queue in self.queues.values_mut().filter(|q| q.is_active()) {
            let outcome = queue.optimise(required_gap);
            summary.queues += 1;
            summary.moved += outcome.touched.len();
            summary.overlaps += outcome.overlaps;
            summary.blocked += outcome.blocked;
            if outcome.overlaps > 0 {
                warn!(
                    instructor_id = %queue.instructor_id(),
                    overlaps = outcome.overlaps,
                    "Overlaps left in place"
                );
            }
            moved.push((queue.instructor_id(), outcome.touched));
        }

        for (instructor_id, touched) in moved {
            self.track(instructor_id, touched);
        }
        info!(
            queues = summary.queues,
            moved = summary.moved,
            overlaps = summary.overlaps,
            blocked = summary.blocked,
            "Queues optimised"
        );
        if summary.moved > 0 {
            self.commit(ChangeKind::QueuesOptimised, Subject::Coordinator, Origin::Operator);
        }
        summary
    }

    pub fn propagate_time(&mut self, instructor_id: InstructorId) -> ScheduleResult<usize> {
        self.propagate(Axis::Time, instructor_id)
    }

    pub fn propagate_location(&mut self, instructor_id: InstructorId) -> ScheduleResult<usize> {
        self.propagate(Axis::Location, instructor_id)
    }

    pub fn propagate_time_all(&mut self) -> ScheduleResult<PropagationSummary> {
        self.propagate_all(Axis::Time)
    }

    pub fn propagate_location_all(&mut self) -> ScheduleResult<PropagationSummary> {
        self.propagate_all(Axis::Location)
    }

    /// Apply the proposal on `axis` to one queue.
    ///
    /// Time propagation shifts the queue so its next pending engagement starts
    /// at the proposed time; location propagation relocates every pending
    /// engagement. Refused while the axis is locked, and for inactive or held
    /// queues. Returns how many engagements changed.
    #[instrument(skip(self))]
    pub fn propagate(&mut self, axis: Axis, instructor_id: InstructorId) -> ScheduleResult<usize> {
        let proposal = self.proposal(axis)?;
        let queue = self.queue_mut(&instructor_id)?;
        let touched = apply_proposal(queue, &proposal)?;
        let moved = touched.len();
        if moved > 0 {
            self.track(instructor_id, touched);
            self.commit(propagation_kind(axis), Subject::Queue(instructor_id), Origin::Operator);
        }
        Ok(moved)
    }

    /// Apply the proposal on `axis` to every active queue.
    ///
    /// Each queue is all-or-nothing; held queues and queues that refuse the
    /// change are reported as skipped and the rest still apply.
    #[instrument(skip(self))]
    pub fn propagate_all(&mut self, axis: Axis) -> ScheduleResult<PropagationSummary> {
        let proposal = self.proposal(axis)?;
        let mut summary = PropagationSummary::default();
        let mut applied = Vec::new();

        for queue in self.queues.values_mut().filter(|q| q.is_active()) {
            let instructor_id = queue.instructor_id();
            match apply_proposal(queue, &proposal) {
                Ok(touched) => {
                    summary.applied.push(instructor_id);
                    summary.moved += touched.len();
                    applied.push((instructor_id, touched));
                }
                Err(err) => {
                    debug!(instructor_id = %instructor_id, error = %err, "Queue skipped");
                    summary.skipped.push(SkippedQueue {
                        instructor_id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        let changed: Vec<InstructorId> = applied
            .iter()
            .filter(|(_, touched)| !touched.is_empty())
            .map(|(id, _)| *id)
            .collect();
        for (instructor_id, touched) in applied {
            self.track(instructor_id, touched);
        }

        info!(
            axis = %axis,
            applied = summary.applied.len(),
            skipped = summary.skipped.len(),
            moved = summary.moved,
            "Proposal propagated"
        );
        let lock_changes = self.refresh();
        for instructor_id in changed {
            self.announce(propagation_kind(axis), Subject::Queue(instructor_id), Origin::Operator);
        }
        self.announce_locks(lock_changes);
        Ok(summary)
    }

    // =========================================================================
    // Confirmations and the feed
    // =========================================================================

    /// Acknowledge every confirming engagement the message touches.
    ///
    /// Messages at or below the cursor are ignored. Returns the engagements
    /// that were confirmed.
    #[instrument(skip(self, message), fields(seq = %message.seq))]
    pub fn apply_confirmation(&mut self, message: &ConfirmationMessage) -> ScheduleResult<Vec<EngagementId>> {
        if self.cursor.is_processed(message.seq) {
            debug!(last_seq = %self.cursor.last_seq, "Confirmation already applied");
            return Ok(Vec::new());
        }
        if message.day != self.day {
            return Err(ScheduleError::FeedInconsistency(format!(
                "confirmation {} is for {}, not {}",
                message.seq, message.day, self.day
            )));
        }

        let confirmed: Vec<EngagementId> = self
            .confirmations
            .keys()
            .filter(|id| {
                self.owner_of(id)
                    .is_ok_and(|owner| message.touches(id, &owner))
            })
            .copied()
            .collect();
        for id in &confirmed {
            self.confirmations.acknowledge(id);
        }
        self.cursor.advance(message.seq);

        if !confirmed.is_empty() {
            info!(count = confirmed.len(), "Writes confirmed");
        }
        for id in &confirmed {
            self.announce(ChangeKind::EngagementConfirmed, Subject::Engagement(*id), Origin::Feed);
        }
        Ok(confirmed)
    }

    /// Roll back every write whose deadline has passed at `now`.
    ///
    /// Each rolled-back engagement gets its pre-optimistic fields back and is
    /// reported as a retryable [`ScheduleError::ConfirmationTimeout`].
    pub fn expire_confirmations(&mut self, now: Instant) -> Vec<ScheduleError> {
        let expired = self.confirmations.expire(now);
        if expired.is_empty() {
            return Vec::new();
        }

        let mut failures = Vec::with_capacity(expired.len());
        let mut reverted = Vec::with_capacity(expired.len());
        for entry in expired {
            let source = entry.error();
            let Expired {
                key,
                snapshot,
                elapsed,
            } = entry;

            match self.queues.get_mut(&snapshot.instructor_id) {
                Some(queue) => match queue.restore(&key, snapshot.fields) {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(engagement_id = %key, "Restored start is shared with another engagement")
                    }
                    Err(err) => warn!(engagement_id = %key, error = %err, "Nothing to roll back"),
                },
                None => warn!(engagement_id = %key, "Queue of unconfirmed write is gone"),
            }
            warn!(engagement_id = %key, elapsed = ?elapsed, "Write not confirmed in time; reverted");
            reverted.push(key);
            failures.push(ScheduleError::ConfirmationTimeout {
                engagement_id: key,
                source,
            });
        }

        let lock_changes = self.refresh();
        for id in reverted {
            self.announce(ChangeKind::EngagementRolledBack, Subject::Engagement(id), Origin::System);
        }
        self.announce_locks(lock_changes);
        failures
    }

    /// [`expire_confirmations`](Self::expire_confirmations) at the clock's now.
    pub fn expire_due(&mut self) -> Vec<ScheduleError> {
        let now = self.clock.now();
        self.expire_confirmations(now)
    }

    /// Bring the queues in line with a feed snapshot.
    ///
    /// Listed instructors get a queue if they lack one and take the feed's
    /// active flag. Their engagements are added or replaced from the feed, and
    /// local engagements the feed no longer lists are dropped. An engagement
    /// that is still confirming keeps its local schedule fields. Instructors
    /// absent from the feed are left untouched.
    #[instrument(skip(self, feed), fields(day = %feed.day, instructors = feed.instructors.len()))]
    pub fn reconcile_feed(&mut self, feed: &DayFeed) -> ScheduleResult<FeedReport> {
        if feed.day != self.day {
            return Err(ScheduleError::FeedInconsistency(format!(
                "feed is for {}, not {}",
                feed.day, self.day
            )));
        }

        let mut report = FeedReport::default();
        for slice in &feed.instructors {
            let instructor_id = slice.instructor_id;
            let (day, bounds) = (self.day, self.config.bounds);
            let queue = self
                .queues
                .entry(instructor_id)
                .or_insert_with(|| InstructorQueue::new(instructor_id, day, bounds));
            queue.set_active(slice.active);

            let listed: BTreeSet<EngagementId> = slice.engagements.iter().map(|e| e.id).collect();
            let missing: Vec<EngagementId> = queue
                .engagements()
                .iter()
                .map(|e| e.id)
                .filter(|id| !listed.contains(id))
                .collect();
            for id in missing {
                if queue.remove(&id).is_ok() {
                    let _ = self.confirmations.forget(&id);
                    warn!(
                        instructor_id = %instructor_id,
                        engagement_id = %id,
                        "Engagement no longer in feed; dropped"
                    );
                    report.dropped.push(id);
                }
            }

            for incoming in &slice.engagements {
                let id = incoming.id;
                let outcome = if queue.contains(&id) {
                    let keep_local = self.confirmations.is_pending(&id);
                    queue.replace(incoming.clone(), keep_local).map(|changed| {
                        if changed {
                            report.updated += 1;
                            if keep_local {
                                report.kept_local += 1;
                            }
                        }
                    })
                } else {
                    queue.load(incoming.clone()).map(|()| report.added += 1)
                };
                if let Err(err) = outcome {
                    warn!(engagement_id = %id, error = %err, "Feed record rejected");
                    report.rejected.push((id, err.to_string()));
                }
            }
        }

        info!(
            added = report.added,
            updated = report.updated,
            dropped = report.dropped.len(),
            rejected = report.rejected.len(),
            "Feed reconciled"
        );
        self.commit(ChangeKind::FeedReconciled, Subject::Coordinator, Origin::Feed);
        Ok(report)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn axis(&self, axis: Axis) -> &AxisState {
        match axis {
            Axis::Time => &self.time_axis,
            Axis::Location => &self.location_axis,
        }
    }

    fn axis_mut(&mut self, axis: Axis) -> &mut AxisState {
        match axis {
            Axis::Time => &mut self.time_axis,
            Axis::Location => &mut self.location_axis,
        }
    }

    fn queue_mut(&mut self, instructor_id: &InstructorId) -> ScheduleResult<&mut InstructorQueue> {
        self.queues
            .get_mut(instructor_id)
            .ok_or(ScheduleError::UnknownInstructor(*instructor_id))
    }

    fn owner_of(&self, id: &EngagementId) -> ScheduleResult<InstructorId> {
        self.queues
            .values()
            .find(|q| q.contains(id))
            .map(InstructorQueue::instructor_id)
            .ok_or(ScheduleError::UnknownEngagement(*id))
    }

    fn proposal(&self, axis: Axis) -> ScheduleResult<Proposal> {
        if self.axis(axis).is_locked() {
            return Err(ScheduleError::AxisLocked(axis));
        }
        match axis {
            Axis::Time => self.proposed_time.map(Proposal::Time),
            Axis::Location => self.proposed_location.clone().map(Proposal::Location),
        }
        .ok_or(ScheduleError::NoProposal(axis))
    }

    fn set_proposed_time(&mut self, minute: u32) -> bool {
        if self.proposed_time == Some(minute) {
            return false;
        }
        self.proposed_time = Some(minute);
        self.commit(ChangeKind::ProposalTimeChanged, Subject::Coordinator, Origin::Operator);
        true
    }

    /// Apply a single-engagement edit and mark it confirming.
    fn edit<F>(&mut self, id: &EngagementId, apply: F) -> ScheduleResult<()>
    where
        F: FnOnce(&mut InstructorQueue) -> ScheduleResult<Touched>,
    {
        let owner = self.owner_of(id)?;
        let touched = apply(self.queue_mut(&owner)?)?;
        if touched.is_empty() {
            return Ok(());
        }
        self.track(owner, touched);
        self.commit(ChangeKind::EngagementUpdated, Subject::Engagement(*id), Origin::Operator);
        Ok(())
    }

    fn track(&mut self, instructor_id: InstructorId, touched: Touched) {
        let now = self.clock.now();
        for (id, fields) in touched {
            let fresh = self
                .confirmations
                .begin(id, Rollback { instructor_id, fields }, now);
            debug!(engagement_id = %id, fresh, "Awaiting confirmation");
        }
    }

    /// Re-derive both axis locks. Returns the notices owed for lock changes.
    fn refresh(&mut self) -> Vec<ChangeKind> {
        let proposed_time = self.proposed_time;
        self.time_sync = self.observe(|e| Some(e.start) == proposed_time);
        let proposed_location = self.proposed_location.clone();
        self.location_sync = self.observe(|e| proposed_location.as_deref() == Some(e.location.as_str()));

        let mut changes = Vec::new();
        for axis in [Axis::Time, Axis::Location] {
            let current = *self.axis(axis);
            let next = reduce(current, self.sync(axis));
            if next.lock != current.lock {
                info!(axis = %axis, from = %current.lock, to = %next.lock, "Lock state changed");
                changes.push(lock_kind(axis));
            }
            *self.axis_mut(axis) = next;
        }
        changes
    }

    fn observe(&self, matches: impl Fn(&Engagement) -> bool) -> SyncObservation {
        let mut observation = SyncObservation::default();
        for next in self
            .queues
            .values()
            .filter(|q| q.is_active())
            .filter_map(InstructorQueue::next_pending)
        {
            observation.total += 1;
            if matches(next) {
                observation.synced += 1;
            }
        }
        observation
    }

    fn commit(&mut self, kind: ChangeKind, subject: Subject, origin: Origin) {
        let lock_changes = self.refresh();
        self.announce(kind, subject, origin);
        self.announce_locks(lock_changes);
    }

    fn announce(&mut self, kind: ChangeKind, subject: Subject, origin: Origin) {
        match subject {
            Subject::Coordinator => self.bus.publish(kind, origin),
            Subject::Queue(id) => self.bus.publish_about(kind, ChangeScope::Queue, id, origin),
            Subject::Engagement(id) => {
                self.bus
                    .publish_about(kind, ChangeScope::Engagement, id, origin)
            }
        };
    }

    fn announce_locks(&mut self, changes: Vec<ChangeKind>) {
        for kind in changes {
            self.bus.publish(kind, Origin::System);
        }
    }
}

fn apply_proposal(queue: &mut InstructorQueue, proposal: &Proposal) -> ScheduleResult<Touched> {
    if !queue.is_active() {
        return Err(ScheduleError::QueueInactive(queue.instructor_id()));
    }
    if queue.is_held() {
        return Err(ScheduleError::QueueHeld(queue.instructor_id()));
    }
    match proposal {
        Proposal::Time(target) => match queue.next_pending() {
            Some(next) => {
                let delta = *target as i32 - next.start as i32;
                queue.shift_all(delta)
            }
            None => Ok(Vec::new()),
        },
        Proposal::Location(location) => queue.set_location(location),
    }
}

fn lock_kind(axis: Axis) -> ChangeKind {
    match axis {
        Axis::Time => ChangeKind::TimeLockChanged,
        Axis::Location => ChangeKind::LocationLockChanged,
    }
}

fn propagation_kind(axis: Axis) -> ChangeKind {
    match axis {
        Axis::Time => ChangeKind::QueueShifted,
        Axis::Location => ChangeKind::QueueLocationSet,
    }
}
