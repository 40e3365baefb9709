//! [`Percent`]-related definitions.

use std::str::FromStr;

use derive_more::Display;
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;

/// Floating-point percentage.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[serde(transparent)]
pub struct Percent(Decimal);

impl Percent {
    /// Creates a new [`Percent`], requiring the provided value to lie within
    /// the `0..=100` range.
    #[must_use]
    pub fn new(val: Decimal) -> Option<Self> {
        (val >= Decimal::ZERO && val <= Decimal::ONE_HUNDRED)
            .then_some(Self(val))
    }

    /// Returns this [`Percent`] of the provided value.
    #[must_use]
    pub fn of(self, val: Decimal) -> Decimal {
        val * self.0 / Decimal::ONE_HUNDRED
    }
}

impl FromStr for Percent {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s)
            .ok()
            .and_then(Self::new)
            .ok_or("invalid percent value")
    }
}

#[cfg(test)]
mod spec {
    use rust_decimal::Decimal;

    use super::Percent;

    #[test]
    fn rejects_out_of_range() {
        assert!(Percent::new(Decimal::new(-1, 0)).is_none());
        assert!(Percent::new(Decimal::new(101, 0)).is_none());
        assert!(Percent::new(Decimal::new(100, 0)).is_some());
    }

    #[test]
    fn of_value() {
        let pct = Percent::new(Decimal::new(5, 0)).unwrap();
        assert_eq!(pct.of(Decimal::new(200, 0)), Decimal::new(10, 0));
    }
}
