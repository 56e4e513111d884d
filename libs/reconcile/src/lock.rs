//! Per-axis lock reducer.
//!
//! The time axis and the location axis each carry an [`AxisState`]. It is
//! recomputed from scratch after every queue change via [`reduce`], so an
//! observer only ever sees the state that matches the current queues.

/// How many active instructors agree with the shared proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncObservation {
    /// Active instructors whose next pending engagement matches the proposal.
    pub synced: usize,

    /// Active instructors with at least one pending engagement.
    pub total: usize,
}

impl SyncObservation {
    pub fn new(synced: usize, total: usize) -> Self {
        Self { synced, total }
    }

    /// Every active instructor matches, and there is at least one.
    pub fn is_synced(&self) -> bool {
        self.total > 0 && self.synced == self.total
    }

    pub fn status(&self) -> ConvergenceStatus {
        if self.total == 0 {
            ConvergenceStatus::Unknown
        } else if self.synced == self.total {
            ConvergenceStatus::Converged
        } else if self.synced > 0 {
            ConvergenceStatus::Converging
        } else {
            ConvergenceStatus::Diverged
        }
    }
}

/// Convergence of the queues toward the shared proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// Every active queue matches the proposal.
    Converged,

    /// Some, not all, active queues match.
    Converging,

    /// No active queue matches.
    Diverged,

    /// No active queue has pending work.
    Unknown,
}

impl ConvergenceStatus {
    /// Returns true if every active queue matches.
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }

    /// Returns true if some queues match but not all.
    pub fn is_converging(&self) -> bool {
        matches!(self, Self::Converging)
    }
}

impl std::fmt::Display for ConvergenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Converged => "converged",
            Self::Converging => "converging",
            Self::Diverged => "diverged",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Lock state of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisLock {
    #[default]
    Unlocked,

    /// Locked because every active queue matched the proposal.
    AutoLocked,

    /// Locked by the operator.
    ManuallyLocked,

    /// Unlocked by the operator while the queues still match; suppresses
    /// re-locking until they stop matching.
    ManuallyUnlocked,
}

impl AxisLock {
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::AutoLocked | Self::ManuallyLocked)
    }
}

impl std::fmt::Display for AxisLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unlocked => "unlocked",
            Self::AutoLocked => "auto-locked",
            Self::ManuallyLocked => "locked",
            Self::ManuallyUnlocked => "unlocked (manual)",
        };
        f.write_str(s)
    }
}

/// Lock state plus the one bit of memory the reducer needs: whether the
/// previous observation was synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisState {
    pub lock: AxisLock,
    pub was_synced: bool,
}

impl AxisState {
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Operator toggle.
    ///
    /// Locked (auto or manual) becomes `ManuallyUnlocked`. Unlocked becomes
    /// `ManuallyLocked` only when there is a proposal to lock to.
    #[must_use]
    pub fn toggle(self, has_proposal: bool) -> Self {
        let lock = if self.lock.is_locked() {
            AxisLock::ManuallyUnlocked
        } else if has_proposal {
            AxisLock::ManuallyLocked
        } else {
            self.lock
        };
        Self { lock, ..self }
    }
}

/// Derive the next axis state from the current one and a fresh observation.
///
/// - Synced and not suppressed: `AutoLocked` (a manual lock stays manual).
/// - `ManuallyUnlocked` survives only while it is suppressing an auto-lock.
/// - `AutoLocked` releases as soon as the queues stop matching.
/// - `ManuallyLocked` releases when a synced state ceases to hold; a manual
///   lock taken while the queues did not match is kept until toggled.
pub fn reduce(state: AxisState, observation: SyncObservation) -> AxisState {
    let synced = observation.is_synced();

    let lock = match state.lock {
        AxisLock::Unlocked | AxisLock::AutoLocked if synced => AxisLock::AutoLocked,
        AxisLock::Unlocked | AxisLock::AutoLocked => AxisLock::Unlocked,
        AxisLock::ManuallyUnlocked if synced => AxisLock::ManuallyUnlocked,
        AxisLock::ManuallyUnlocked => AxisLock::Unlocked,
        AxisLock::ManuallyLocked if !synced && state.was_synced => AxisLock::Unlocked,
        AxisLock::ManuallyLocked => AxisLock::ManuallyLocked,
    };

    AxisState {
        lock,
        was_synced: synced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SYNCED: SyncObservation = SyncObservation { synced: 3, total: 3 };
    const PARTIAL: SyncObservation = SyncObservation { synced: 2, total: 3 };
    const IDLE: SyncObservation = SyncObservation { synced: 0, total: 0 };

    fn state(lock: AxisLock, was_synced: bool) -> AxisState {
        AxisState { lock, was_synced }
    }

    #[test]
    fn test_auto_locks_when_all_match() {
        let next = reduce(AxisState::default(), SYNCED);
        assert_eq!(next.lock, AxisLock::AutoLocked);
        assert!(next.was_synced);
    }

    #[test]
    fn test_no_active_instructors_never_locks() {
        assert!(!IDLE.is_synced());
        assert_eq!(reduce(AxisState::default(), IDLE).lock, AxisLock::Unlocked);
    }

    #[test]
    fn test_auto_lock_releases_when_sync_breaks() {
        let locked = reduce(AxisState::default(), SYNCED);
        assert_eq!(reduce(locked, PARTIAL).lock, AxisLock::Unlocked);
    }

    #[test]
    fn test_manual_unlock_suppresses_then_clears() {
        let locked = reduce(AxisState::default(), SYNCED);
        let unlocked = reduce(locked.toggle(true), SYNCED);
        assert_eq!(unlocked.lock, AxisLock::ManuallyUnlocked);

        // still synced: stays suppressed
        assert_eq!(reduce(unlocked, SYNCED).lock, AxisLock::ManuallyUnlocked);

        // sync breaks: override is spent
        let cleared = reduce(unlocked, PARTIAL);
        assert_eq!(cleared.lock, AxisLock::Unlocked);

        // sync returns: auto-locks again
        assert_eq!(reduce(cleared, SYNCED).lock, AxisLock::AutoLocked);
    }

    #[test]
    fn test_manual_lock_without_proposal_is_noop() {
        let s = AxisState::default().toggle(false);
        assert_eq!(s.lock, AxisLock::Unlocked);
    }

    #[test]
    fn test_manual_lock_held_while_never_synced() {
        let s = reduce(AxisState::default().toggle(true), PARTIAL);
        assert_eq!(s.lock, AxisLock::ManuallyLocked);
        assert_eq!(reduce(s, PARTIAL).lock, AxisLock::ManuallyLocked);
    }

    #[test]
    fn test_manual_lock_released_when_sync_ceases() {
        let s = reduce(state(AxisLock::ManuallyLocked, false), SYNCED);
        assert_eq!(s.lock, AxisLock::ManuallyLocked);
        assert_eq!(reduce(s, PARTIAL).lock, AxisLock::Unlocked);
    }

    #[test]
    fn test_convergence_status() {
        assert_eq!(SYNCED.status(), ConvergenceStatus::Converged);
        assert!(PARTIAL.status().is_converging());
        assert_eq!(SyncObservation::new(0, 2).status(), ConvergenceStatus::Diverged);
        assert_eq!(IDLE.status(), ConvergenceStatus::Unknown);
    }

    fn any_lock() -> impl Strategy<Value = AxisLock> {
        prop_oneof![
            Just(AxisLock::Unlocked),
            Just(AxisLock::AutoLocked),
            Just(AxisLock::ManuallyLocked),
            Just(AxisLock::ManuallyUnlocked),
        ]
    }

    proptest! {
        #[test]
        fn prop_synced_locks_unless_manually_unlocked(lock in any_lock(), was in any::<bool>(), n in 1usize..8) {
            let next = reduce(state(lock, was), SyncObservation::new(n, n));
            prop_assert_eq!(next.is_locked(), lock != AxisLock::ManuallyUnlocked);
        }

        #[test]
        fn prop_unsynced_never_auto_locked(lock in any_lock(), was in any::<bool>(), synced in 0usize..4, extra in 1usize..4) {
            let next = reduce(state(lock, was), SyncObservation::new(synced, synced + extra));
            prop_assert_ne!(next.lock, AxisLock::AutoLocked);
            prop_assert_ne!(next.lock, AxisLock::ManuallyUnlocked);
        }

        #[test]
        fn prop_reduce_is_idempotent(lock in any_lock(), was in any::<bool>(), synced in 0usize..4, total in 0usize..4) {
            let obs = SyncObservation::new(synced.min(total), total);
            let once = reduce(state(lock, was), obs);
            prop_assert_eq!(reduce(once, obs), once);
        }
    }
}
