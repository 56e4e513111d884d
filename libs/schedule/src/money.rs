//! Fixed-point money.

use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

const MICROS_PER_UNIT: i64 = 1_000_000;

/// An amount in millionths of a currency unit.
///
/// Per-engagement amounts are rounded once, to the micro-unit, when they are
/// computed; every aggregate after that is exact integer addition, so totals
/// do not depend on how engagements are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Money(i64);

impl Money {
    pub const ZERO: Self = Self(0);

    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub const fn from_units(units: i64) -> Self {
        Self(units * MICROS_PER_UNIT)
    }

    pub const fn micros(&self) -> i64 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / MICROS_PER_UNIT as f64
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `self × numerator / denominator`, rounded half away from zero.
    ///
    /// `denominator` must be non-zero.
    pub fn mul_ratio(&self, numerator: u64, denominator: u64) -> Self {
        let num = self.0 as i128 * numerator as i128;
        let den = denominator as i128;
        let half = den / 2;
        let rounded = if num >= 0 {
            (num + half) / den
        } else {
            (num - half) / den
        };
        Self(rounded as i64)
    }

    /// `self × factor`, rounded to the micro-unit.
    pub fn scale(&self, factor: f64) -> Self {
        Self((self.0 as f64 * factor).round() as i64)
    }
}

impl From<f64> for Money {
    fn from(units: f64) -> Self {
        Self((units * MICROS_PER_UNIT as f64).round() as i64)
    }
}

impl From<Money> for f64 {
    fn from(money: Money) -> Self {
        money.as_f64()
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_ratio_rounds_half_away_from_zero() {
        assert_eq!(Money::from_micros(10).mul_ratio(1, 4), Money::from_micros(3));
        assert_eq!(Money::from_micros(-10).mul_ratio(1, 4), Money::from_micros(-3));
        assert_eq!(Money::from_units(60).mul_ratio(45, 60), Money::from_units(45));
    }

    #[test]
    fn test_serde_as_decimal_number() {
        let m: Money = serde_json::from_str("85.5").unwrap();
        assert_eq!(m, Money::from_micros(85_500_000));
        assert_eq!(serde_json::to_string(&m).unwrap(), "85.5");
        assert_eq!(m.to_string(), "85.50");
    }

    #[test]
    fn test_sum() {
        let total: Money = [1, 2, 3].into_iter().map(Money::from_units).sum();
        assert_eq!(total, Money::from_units(6));
    }
}
