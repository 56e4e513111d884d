//! Revenue proration and instructor compensation.
//!
//! Two pay models are supported: a fixed hourly rate, and a percentage of the
//! revenue an engagement earns. Every amount is computed per engagement and
//! then summed, so any grouping (per instructor, per lesson, per day) adds up
//! to the same total.

use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::engagement::Engagement;
use crate::error::{ScheduleError, ScheduleResult};
use crate::money::Money;

/// Substituted for a zero nominal package duration.
pub const DEFAULT_NOMINAL_MINUTES: u32 = 60;

/// How an instructor is paid for an engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum CompensationModel {
    Fixed { rate_per_hour: Money },
    Percentage { rate_percent: f64 },
}

impl CompensationModel {
    pub fn validate(&self) -> ScheduleResult<()> {
        match self {
            CompensationModel::Fixed { rate_per_hour } if rate_per_hour.is_negative() => Err(
                ScheduleError::InvalidRate(format!("hourly rate {rate_per_hour} is negative")),
            ),
            CompensationModel::Percentage { rate_percent }
                if !rate_percent.is_finite() || *rate_percent < 0.0 =>
            {
                Err(ScheduleError::InvalidRate(format!(
                    "percentage {rate_percent} is not a non-negative number"
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            CompensationModel::Fixed { rate_per_hour } => format!("{rate_per_hour}/h"),
            CompensationModel::Percentage { rate_percent } => format!("{rate_percent}%"),
        }
    }
}

/// `price × participants × duration / nominal`, with a zero nominal duration
/// treated as [`DEFAULT_NOMINAL_MINUTES`].
pub fn revenue(price_per_participant: Money, participants: u32, duration: u32, nominal: u32) -> Money {
    let nominal = if nominal == 0 {
        DEFAULT_NOMINAL_MINUTES
    } else {
        nominal
    };
    price_per_participant.mul_ratio(participants as u64 * duration as u64, nominal as u64)
}

/// Instructor earning for one engagement.
pub fn earn(duration: u32, model: &CompensationModel, revenue: Money) -> Money {
    match model {
        CompensationModel::Fixed { rate_per_hour } => rate_per_hour.mul_ratio(duration as u64, 60),
        CompensationModel::Percentage { rate_percent } => revenue.scale(rate_percent / 100.0),
    }
}

/// Revenue and commission for one engagement or any group of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Earnings {
    pub revenue: Money,
    pub commission: Money,
}

impl Earnings {
    /// What the business keeps.
    pub fn profit(&self) -> Money {
        self.revenue - self.commission
    }
}

impl Add for Earnings {
    type Output = Earnings;

    fn add(self, rhs: Earnings) -> Earnings {
        Earnings {
            revenue: self.revenue + rhs.revenue,
            commission: self.commission + rhs.commission,
        }
    }
}

impl AddAssign for Earnings {
    fn add_assign(&mut self, rhs: Earnings) {
        *self = *self + rhs;
    }
}

impl Sum for Earnings {
    fn sum<I: Iterator<Item = Earnings>>(iter: I) -> Earnings {
        iter.fold(Earnings::default(), Add::add)
    }
}

/// Grand total over a set of engagements.
pub fn total<'a>(engagements: impl IntoIterator<Item = &'a Engagement>) -> Earnings {
    engagements.into_iter().map(Engagement::earnings).sum()
}

/// Subtotals grouped by an arbitrary key.
pub fn subtotals_by<'a, K, F>(
    engagements: impl IntoIterator<Item = &'a Engagement>,
    key: F,
) -> BTreeMap<K, Earnings>
where
    K: Ord,
    F: Fn(&Engagement) -> K,
{
    let mut groups: BTreeMap<K, Earnings> = BTreeMap::new();
    for engagement in engagements {
        *groups.entry(key(engagement)).or_default() += engagement.earnings();
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engagement::fixtures::engagement;
    use cadence_id::{InstructorId, LessonId};
    use proptest::prelude::*;

    #[test]
    fn test_fixed_rate() {
        let model = CompensationModel::Fixed {
            rate_per_hour: Money::from_units(40),
        };
        assert_eq!(earn(90, &model, Money::ZERO), Money::from_units(60));
    }

    #[test]
    fn test_percentage_rate() {
        let model = CompensationModel::Percentage { rate_percent: 30.0 };
        assert_eq!(earn(90, &model, Money::from_units(200)), Money::from_units(60));
    }

    #[test]
    fn test_revenue_prorates_against_nominal() {
        // 100 × 2 × 45/90
        assert_eq!(revenue(Money::from_units(100), 2, 45, 90), Money::from_units(100));
    }

    #[test]
    fn test_zero_nominal_duration_uses_sixty() {
        assert_eq!(
            revenue(Money::from_units(100), 1, 30, 0),
            revenue(Money::from_units(100), 1, 30, 60)
        );
    }

    #[test]
    fn test_negative_rates_rejected() {
        let model = CompensationModel::Fixed {
            rate_per_hour: Money::from_units(-1),
        };
        assert!(matches!(model.validate(), Err(ScheduleError::InvalidRate(_))));
        let model = CompensationModel::Percentage { rate_percent: -5.0 };
        assert!(model.validate().is_err());
        let model = CompensationModel::Percentage { rate_percent: f64::NAN };
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_profit() {
        let e = Earnings {
            revenue: Money::from_units(100),
            commission: Money::from_units(35),
        };
        assert_eq!(e.profit(), Money::from_units(65));
    }

    #[test]
    fn test_serde_tagged() {
        let json = serde_json::to_value(CompensationModel::Fixed {
            rate_per_hour: Money::from_units(25),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"model": "fixed", "rate_per_hour": 25.0}));
    }

    proptest! {
        #[test]
        fn prop_fixed_earning_proportional_to_duration(rate in 0i64..500, thirds in 1u32..80, k in 1u32..5) {
            // whole multiples of 3 minutes keep every amount exact in micro-units
            let minutes = thirds * 3;
            let model = CompensationModel::Fixed { rate_per_hour: Money::from_units(rate) };
            let one = earn(minutes, &model, Money::ZERO);
            let many = earn(minutes * k, &model, Money::ZERO);
            prop_assert_eq!(many.micros(), one.micros() * k as i64);
        }

        #[test]
        fn prop_percentage_earning_proportional_to_duration(price in 0i64..300, people in 1u32..6, thirds in 1u32..80, k in 1u32..5, pct in 0u32..=100) {
            let minutes = thirds * 3;
            let model = CompensationModel::Percentage { rate_percent: pct as f64 };
            let base = revenue(Money::from_units(price), people, minutes, 60);
            let scaled = revenue(Money::from_units(price), people, minutes * k, 60);
            prop_assert_eq!(scaled.micros(), base.micros() * k as i64);
            let one = earn(minutes, &model, base);
            let many = earn(minutes * k, &model, scaled);
            prop_assert_eq!(many.micros(), one.micros() * k as i64);
        }

        #[test]
        fn prop_totals_independent_of_grouping(
            durations in proptest::collection::vec(15u32..180, 1..20),
            lesson_picks in proptest::collection::vec(0usize..4, 20),
        ) {
            let instructor = InstructorId::new();
            let lessons: Vec<LessonId> = (0..4).map(|_| LessonId::new()).collect();
            let engagements: Vec<Engagement> = durations
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    let mut e = engagement(instructor, "09:00", *d);
                    e.lesson_id = lessons[lesson_picks[i]];
                    if i % 2 == 0 {
                        e.compensation = CompensationModel::Percentage { rate_percent: 35.0 };
                    }
                    e
                })
                .collect();

            let per_engagement: Earnings = engagements.iter().map(Engagement::earnings).sum();
            let per_lesson: Earnings = subtotals_by(&engagements, |e| e.lesson_id).into_values().sum();
            let grand = total(&engagements);

            prop_assert_eq!(per_engagement, grand);
            prop_assert_eq!(per_lesson, grand);
        }
    }
}
