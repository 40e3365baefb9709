//! Return flow [`State`] of a booking.

use std::time::Duration;

use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rand::{distributions::Alphanumeric, Rng as _};
use serde::{Deserialize, Serialize};

use crate::domain::booking::DeliveryStatus;

#[cfg(doc)]
use crate::domain::Booking;

/// Period a [`Token`] remains valid for after the rental window ends.
pub const TOKEN_VALIDITY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Return flow [`State`] of a [`Booking`].
///
/// Stored alongside the [`Booking`] and mutated through it only, so the
/// [`DeliveryStatus`] and this [`State`] never diverge.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct State {
    /// Single-use return [`Token`] minted for the customer.
    pub token: Option<Token>,

    /// [`DateTime`] when the [`Token`] expires.
    ///
    /// [`DateTime`]: common::DateTime
    pub token_expires_at: Option<TokenExpirationDateTime>,

    /// [`Method`] the customer returned the item by.
    pub method: Option<Method>,

    /// Carrier tracking number, for [`Method::ExpressShipping`] returns.
    pub tracking_number: Option<TrackingNumber>,

    /// [`DateTime`] when the customer submitted the return.
    ///
    /// [`DateTime`]: common::DateTime
    pub submitted_at: Option<SubmissionDateTime>,

    /// [`DateTime`] when the lender confirmed receiving the item back.
    ///
    /// [`DateTime`]: common::DateTime
    pub received_at: Option<ReceiptDateTime>,

    /// Late fee suggested by the overdue escalation.
    pub suggested_late_fee: Option<Money>,

    /// Replacement fee suggested by the overdue escalation.
    pub suggested_replacement_fee: Option<Money>,

    /// Number of return reminders sent to the customer so far.
    pub reminder_count: u32,

    /// Whether return reminders are stopped permanently.
    pub reminders_stopped: bool,

    /// Issue reported by the lender on the returned item, if any.
    pub issue: Option<Issue>,
}

/// Single-use return token authorizing a customer to submit a return.
#[derive(
    AsRef,
    Clone,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Token(String);

impl Token {
    /// Length of a generated [`Token`], in characters.
    pub const LENGTH: usize = 32;

    /// Generates a new random alphanumeric [`Token`].
    #[must_use]
    pub fn generate() -> Self {
        Self(
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(Self::LENGTH)
                .map(char::from)
                .collect(),
        )
    }
}

define_kind! {
    #[doc = "Method a customer returns an item by."]
    enum Method {
        #[doc = "Item is shipped back via a carrier."]
        ExpressShipping = 1,

        #[doc = "Item is dropped off at the lender's pickup point."]
        LocalDropOff = 2,
    }
}

/// Carrier tracking number of a shipped return.
#[derive(
    AsRef,
    Clone,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[as_ref(str, String)]
pub struct TrackingNumber(String);

/// Issue reported by a lender on a returned item.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Issue {
    /// [`issue::Kind`] of this [`Issue`].
    pub kind: issue::Kind,

    /// Free-form notes of the lender.
    pub notes: String,
}

pub mod issue {
    //! Returned-item [`Issue`]-related definitions.

    use common::define_kind;

    #[cfg(doc)]
    use super::Issue;

    define_kind! {
        #[doc = "Kind of an [`Issue`] with a returned item."]
        enum Kind {
            #[doc = "Item came back damaged."]
            Damaged = 1,

            #[doc = "Item came back with parts missing."]
            MissingParts = 2,

            #[doc = "A different item came back."]
            WrongItem = 3,

            #[doc = "Anything else."]
            Other = 4,
        }
    }
}

/// Returns the escalation [`DeliveryStatus`] corresponding to the provided
/// number of days a return is late by.
///
/// [`None`] is returned in case the return is not late at all.
#[must_use]
pub fn escalation_status(days_late: u64) -> Option<DeliveryStatus> {
    match days_late {
        0 => None,
        1..=4 => Some(DeliveryStatus::LateReturn),
        5..=9 => Some(DeliveryStatus::Overdue),
        10..=14 => Some(DeliveryStatus::Escalated),
        15..=29 => Some(DeliveryStatus::HighRisk),
        30.. => Some(DeliveryStatus::NonReturned),
    }
}

/// [`DateTime`] when a return [`Token`] expires.
///
/// [`DateTime`]: common::DateTime
pub type TokenExpirationDateTime = DateTimeOf<(Token, unit::Expiration)>;

/// [`DateTime`] when a customer submitted a return.
///
/// [`DateTime`]: common::DateTime
pub type SubmissionDateTime = DateTimeOf<(State, unit::Confirmation)>;

/// [`DateTime`] when a lender confirmed receiving an item back.
///
/// [`DateTime`]: common::DateTime
pub type ReceiptDateTime = DateTimeOf<(State, unit::Receipt)>;

#[cfg(test)]
mod spec {
    use crate::domain::booking::DeliveryStatus;

    use super::{escalation_status, Token};

    #[test]
    fn token_is_32_alphanumeric_chars() {
        let token = Token::generate();
        let raw: &str = token.as_ref();

        assert_eq!(raw.len(), Token::LENGTH);
        assert!(raw.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(Token::generate(), Token::generate());
    }

    #[test]
    fn escalation_thresholds() {
        assert_eq!(escalation_status(0), None);
        assert_eq!(escalation_status(1), Some(DeliveryStatus::LateReturn));
        assert_eq!(escalation_status(4), Some(DeliveryStatus::LateReturn));
        assert_eq!(escalation_status(5), Some(DeliveryStatus::Overdue));
        assert_eq!(escalation_status(9), Some(DeliveryStatus::Overdue));
        assert_eq!(escalation_status(10), Some(DeliveryStatus::Escalated));
        assert_eq!(escalation_status(14), Some(DeliveryStatus::Escalated));
        assert_eq!(escalation_status(15), Some(DeliveryStatus::HighRisk));
        assert_eq!(escalation_status(29), Some(DeliveryStatus::HighRisk));
        assert_eq!(escalation_status(30), Some(DeliveryStatus::NonReturned));
        assert_eq!(escalation_status(365), Some(DeliveryStatus::NonReturned));
    }
}
