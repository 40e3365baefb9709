//! [`Money`]-related definitions.

use std::{fmt, str::FromStr};

use rust_decimal::{prelude::ToPrimitive as _, Decimal};

use crate::define_kind;

/// Amount of money in some [`Currency`].
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize,
)]
pub struct Money {
    /// Amount of this [`Money`].
    pub amount: Decimal,

    /// [`Currency`] of this amount.
    pub currency: Currency,
}

impl Money {
    /// Creates a new zero [`Money`] amount in the provided [`Currency`].
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Indicates whether this [`Money`] amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Sums this [`Money`] with the provided one.
    ///
    /// [`None`] is returned in case of a [`Currency`] mismatch or an
    /// arithmetic overflow.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        (self.currency == rhs.currency)
            .then(|| self.amount.checked_add(rhs.amount))
            .flatten()
            .map(|amount| Self {
                amount,
                currency: self.currency,
            })
    }

    /// Subtracts the provided [`Money`] from this one.
    ///
    /// [`None`] is returned in case of a [`Currency`] mismatch or an
    /// arithmetic overflow.
    #[must_use]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        (self.currency == rhs.currency)
            .then(|| self.amount.checked_sub(rhs.amount))
            .flatten()
            .map(|amount| Self {
                amount,
                currency: self.currency,
            })
    }

    /// Subtracts the provided [`Money`] from this one, flooring the result
    /// at zero.
    ///
    /// [`None`] is returned in case of a [`Currency`] mismatch.
    #[must_use]
    pub fn saturating_sub(self, rhs: Self) -> Option<Self> {
        self.checked_sub(rhs).map(|m| {
            if m.amount.is_sign_negative() {
                Self::zero(m.currency)
            } else {
                m
            }
        })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { amount, currency } = self;
        if amount.is_integer() {
            write!(f, "{}{currency}", amount.to_i128().expect("integer"))
        } else {
            write!(f, "{amount}{currency}")
        }
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 4 {
            return Err("too short");
        }

        let (amount, currency) = s.split_at(s.len() - 3);
        let amount = Decimal::from_str(amount).map_err(|_| "invalid amount")?;
        let currency =
            Currency::from_str(currency).map_err(|_| "invalid currency")?;

        Ok(Self { amount, currency })
    }
}

define_kind! {
    #[doc = "Currency of a [`Money`] amount."]
    enum Currency {
        #[doc = "US Dollar."]
        Usd = 1,

        #[doc = "Euro."]
        Eur = 2,

        #[doc = "British Pound."]
        Gbp = 3,
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::{Currency, Money};

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn usd(s: &str) -> Money {
        Money {
            amount: decimal(s),
            currency: Currency::Usd,
        }
    }

    #[test]
    fn from_str() {
        assert_eq!(Money::from_str("123.45USD").unwrap(), usd("123.45"));

        assert_eq!(
            Money::from_str("123.45GBP").unwrap(),
            Money {
                amount: decimal("123.45"),
                currency: Currency::Gbp,
            },
        );

        assert!(Money::from_str("123.45").is_err());
        assert!(Money::from_str("123.45Us").is_err());
        assert!(Money::from_str("123.45Usdollar").is_err());

        assert!(Money::from_str("123.00USD").is_ok());
        assert!(Money::from_str("123USD").is_ok());
    }

    #[test]
    fn to_string() {
        assert_eq!(usd("123.45").to_string(), "123.45USD");
        assert_eq!(usd("123.00").to_string(), "123USD");
        assert_eq!(usd("123").to_string(), "123USD");
    }

    #[test]
    fn checked_arithmetic() {
        assert_eq!(usd("10").checked_add(usd("2.50")), Some(usd("12.50")));
        assert_eq!(usd("10").checked_sub(usd("2.50")), Some(usd("7.50")));

        let eur = Money {
            amount: decimal("1"),
            currency: Currency::Eur,
        };
        assert_eq!(usd("10").checked_add(eur), None);
        assert_eq!(usd("10").checked_sub(eur), None);
    }

    #[test]
    fn saturating_sub_floors_at_zero() {
        assert_eq!(usd("10").saturating_sub(usd("3")), Some(usd("7")));
        assert_eq!(
            usd("10").saturating_sub(usd("15")),
            Some(Money::zero(Currency::Usd)),
        );
    }
}
