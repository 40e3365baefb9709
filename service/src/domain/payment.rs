//! [`Payment`] definitions and payment-processor [`Event`]s.

use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::booking;

/// Payment collected through the external payment processor.
///
/// Referenced by a [`Booking`] by ID only; mutated exclusively by the
/// payment reconciliation command.
///
/// [`Booking`]: crate::domain::Booking
#[derive(Clone, Debug)]
pub struct Payment {
    /// ID of this [`Payment`].
    pub id: Id,

    /// ID of the related [`Booking`], if this [`Payment`] pays for one.
    ///
    /// [`Booking`]: crate::domain::Booking
    pub booking_id: Option<booking::Id>,

    /// [`Kind`] of this [`Payment`].
    pub kind: Kind,

    /// Processor-assigned payment-intent ID, set once the checkout
    /// completes.
    pub intent_id: Option<IntentId>,

    /// Amount of this [`Payment`].
    pub amount: Money,

    /// [`Status`] of this [`Payment`].
    pub status: Status,

    /// [`DateTime`] when this [`Payment`] was created.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: CreationDateTime,
}

/// ID of a [`Payment`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Processor-assigned ID of a payment intent.
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
pub struct IntentId(String);

define_kind! {
    #[doc = "Kind of a [`Payment`]."]
    enum Kind {
        #[doc = "[`Payment`] for a booking."]
        Booking = 1,

        #[doc = "[`Payment`] for a subscription."]
        Subscription = 2,
    }
}

define_kind! {
    #[doc = "Status of a [`Payment`]."]
    enum Status {
        #[doc = "Checkout initiated, outcome unknown yet."]
        Pending = 1,

        #[doc = "Processor confirmed the charge."]
        Paid = 2,

        #[doc = "Processor reported a charge failure."]
        Failed = 3,

        #[doc = "Checkout expired before completion."]
        Expired = 4,

        #[doc = "Charge was fully refunded."]
        Refunded = 5,
    }
}

/// [`DateTime`] when a [`Payment`] was created.
///
/// [`DateTime`]: common::DateTime
pub type CreationDateTime = DateTimeOf<(Payment, unit::Creation)>;

/// Inbound payment-processor event.
///
/// Delivered at-least-once and unordered: application must be idempotent.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Event {
    /// Processor-assigned ID of this [`Event`].
    pub id: event::Id,

    /// [`event::Kind`] of this [`Event`] with its payload.
    #[serde(flatten)]
    pub kind: event::Kind,
}

pub mod event {
    //! Payment-processor [`Event`]-related definitions.

    use common::Money;
    use derive_more::{AsRef, Display, From, Into};
    use serde::{Deserialize, Serialize};

    use crate::domain::{booking, refund};

    use super::IntentId;

    #[cfg(doc)]
    use super::{Event, Payment};

    /// Processor-assigned ID of an [`Event`].
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
    pub struct Id(String);

    /// Kind of an [`Event`] with its payload.
    #[derive(Clone, Debug, Deserialize, Serialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum Kind {
        /// Checkout session completed: the charge succeeded.
        CheckoutCompleted {
            /// ID of the related [`Payment`], from application-supplied
            /// metadata.
            payment_id: super::Id,

            /// ID of the related [`Booking`], from application-supplied
            /// metadata.
            ///
            /// [`Booking`]: crate::domain::Booking
            booking_id: booking::Id,

            /// Processor-assigned payment-intent ID.
            intent_id: IntentId,
        },

        /// Redundant charge confirmation.
        PaymentSucceeded {
            /// ID of the related [`Payment`].
            payment_id: super::Id,

            /// ID of the related [`Booking`].
            ///
            /// [`Booking`]: crate::domain::Booking
            booking_id: booking::Id,

            /// Processor-assigned payment-intent ID.
            intent_id: IntentId,
        },

        /// Charge failed.
        PaymentFailed {
            /// ID of the related [`Payment`].
            payment_id: super::Id,

            /// ID of the related [`Booking`].
            ///
            /// [`Booking`]: crate::domain::Booking
            booking_id: booking::Id,

            /// Processor-supplied failure reason.
            reason: String,
        },

        /// Checkout session expired before completion.
        CheckoutExpired {
            /// ID of the related [`Payment`].
            payment_id: super::Id,
        },

        /// Charge was (partially) refunded.
        ///
        /// Carries no booking metadata: the booking is resolved via the
        /// payment-intent linkage.
        Refund {
            /// Processor-assigned ID of the refund.
            refund_id: refund::Id,

            /// Processor-assigned payment-intent ID.
            intent_id: IntentId,

            /// Refunded amount.
            amount: Money,

            /// Processor-supplied refund reason, if any.
            reason: Option<String>,
        },
    }
}
