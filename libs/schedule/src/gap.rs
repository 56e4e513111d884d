//! Timing relationship between an engagement and its predecessor.

use serde::Serialize;

use crate::engagement::Engagement;

/// The four mutually exclusive relationships, checked in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GapState {
    /// Starts before the predecessor ends.
    Overlap,
    /// Starts after the predecessor ends but inside the required gap.
    Overdue,
    /// Starts later than the required gap demands.
    Gap,
    /// Starts exactly when the required gap ends.
    None,
}

impl GapState {
    /// States the optimiser closes. Overlaps are left for the operator.
    pub fn is_correctable(&self) -> bool {
        matches!(self, GapState::Overdue | GapState::Gap)
    }
}

impl std::fmt::Display for GapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GapState::Overlap => "overlap",
            GapState::Overdue => "overdue",
            GapState::Gap => "gap",
            GapState::None => "none",
        };
        f.write_str(s)
    }
}

/// Derived, never stored. `magnitude` is 0 exactly when `state` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GapRecord {
    pub state: GapState,
    pub magnitude: u32,
}

impl GapRecord {
    pub const NONE: GapRecord = GapRecord {
        state: GapState::None,
        magnitude: 0,
    };
}

/// Classify a start time against a predecessor span.
pub fn classify_span(prev_start: u32, prev_duration: u32, current_start: u32, required_gap: u32) -> GapRecord {
    let prev_end = prev_start as i64 + prev_duration as i64;
    let required_start = prev_end + required_gap as i64;
    let start = current_start as i64;

    let (state, magnitude) = if prev_end > start {
        (GapState::Overlap, prev_end - start)
    } else if required_start > start {
        (GapState::Overdue, required_start - start)
    } else if start > required_start {
        (GapState::Gap, start - required_start)
    } else {
        (GapState::None, 0)
    };

    GapRecord {
        state,
        magnitude: magnitude as u32,
    }
}

pub fn classify(previous: &Engagement, current: &Engagement, required_gap: u32) -> GapRecord {
    classify_span(previous.start, previous.duration, current.start, required_gap)
}

/// One record per position; the first engagement has no predecessor.
pub fn audit(engagements: &[Engagement], required_gap: u32) -> Vec<GapRecord> {
    let mut records = Vec::with_capacity(engagements.len());
    if engagements.is_empty() {
        return records;
    }
    records.push(GapRecord::NONE);
    records.extend(
        engagements
            .windows(2)
            .map(|pair| classify(&pair[0], &pair[1], required_gap)),
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engagement::fixtures::engagement;
    use crate::time::to_minutes;
    use cadence_id::InstructorId;
    use proptest::prelude::*;
    use rstest::rstest;

    // Predecessor ends at 11:30 unless stated otherwise; required gap is 15.
    #[rstest]
    #[case::overlap("11:00", 45, "11:30", GapState::Overlap, 15)]
    #[case::overdue("10:45", 45, "11:40", GapState::Overdue, 5)]
    #[case::gap("10:45", 45, "12:00", GapState::Gap, 15)]
    #[case::none("10:45", 45, "11:45", GapState::None, 0)]
    #[case::back_to_back_with_gap("10:45", 45, "11:30", GapState::Overdue, 15)]
    fn test_classify(
        #[case] prev_start: &str,
        #[case] prev_duration: u32,
        #[case] current_start: &str,
        #[case] state: GapState,
        #[case] magnitude: u32,
    ) {
        let record = classify_span(
            to_minutes(prev_start),
            prev_duration,
            to_minutes(current_start),
            15,
        );
        assert_eq!(record, GapRecord { state, magnitude });
    }

    #[test]
    fn test_zero_required_gap() {
        let record = classify_span(600, 60, 660, 0);
        assert_eq!(record, GapRecord::NONE);
    }

    #[test]
    fn test_audit_first_is_none() {
        let ins = InstructorId::new();
        let queue = vec![
            engagement(ins, "09:00", 60),
            engagement(ins, "10:30", 60),
            engagement(ins, "11:20", 60),
        ];
        let records = audit(&queue, 15);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], GapRecord::NONE);
        assert_eq!(records[1], GapRecord { state: GapState::Gap, magnitude: 15 });
        assert_eq!(records[2], GapRecord { state: GapState::Overlap, magnitude: 10 });
        assert!(audit(&[], 15).is_empty());
    }

    proptest! {
        #[test]
        fn prop_magnitude_zero_iff_none(prev_start in 0u32..1440, dur in 1u32..240, start in 0u32..1440, gap in 0u32..60) {
            let record = classify_span(prev_start, dur, start, gap);
            prop_assert_eq!(record.magnitude == 0, record.state == GapState::None);
        }

        #[test]
        fn prop_state_matches_definition(prev_start in 0u32..1440, dur in 1u32..240, start in 0u32..1440, gap in 0u32..60) {
            let record = classify_span(prev_start, dur, start, gap);
            let end = prev_start + dur;
            let req = end + gap;
            let expected = if end > start {
                GapState::Overlap
            } else if req > start {
                GapState::Overdue
            } else if start > req {
                GapState::Gap
            } else {
                GapState::None
            };
            prop_assert_eq!(record.state, expected);
        }
    }
}
