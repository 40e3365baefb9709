//! Outbound collaborator seam.
//!
//! Notifications and payment-processor calls leave the service through an
//! [`Outbound`] handler, so delivery stays swappable: the [`Log`]
//! implementation ships for wiring, tests record instead.

use common::{operations::Perform, Money};
use derive_more::{Display, Error as StdError};
use tracerr::Traced;
use tracing as log;
use uuid::Uuid;

use crate::domain::{booking, payment, refund, user};

/// Outbound operation.
pub use common::Handler as Outbound;

/// Operation of notifying a user about a booking.
#[derive(Clone, Debug)]
pub struct Notify {
    /// ID of the user to notify.
    pub recipient: user::Id,

    /// [`booking::Template`] of the notification.
    pub template: booking::Template,

    /// ID of the [`Booking`] the notification is about.
    ///
    /// [`Booking`]: crate::domain::Booking
    pub booking_id: booking::Id,
}

/// Operation of creating a checkout session with the payment processor.
#[derive(Clone, Copy, Debug)]
pub struct CreateCheckout {
    /// ID of the [`payment::Payment`] to collect.
    pub payment_id: payment::Id,

    /// ID of the charged [`Booking`].
    ///
    /// [`Booking`]: crate::domain::Booking
    pub booking_id: booking::Id,

    /// Amount to collect.
    pub amount: Money,
}

/// Operation of requesting a refund from the payment processor.
#[derive(Clone, Debug)]
pub struct RequestRefund {
    /// Payment-intent ID to refund.
    pub intent_id: payment::IntentId,

    /// Amount to refund.
    pub amount: Money,

    /// Reason of the refund, if any.
    pub reason: Option<String>,
}

/// Error of an [`Outbound`] operation.
#[derive(Debug, Display, StdError)]
#[display("outbound operation failed: {_0}")]
pub struct Error(#[error(not(source))] pub String);

/// No-delivery [`Outbound`] implementation, only logging the operations it
/// receives.
#[derive(Clone, Copy, Debug, Default)]
pub struct Log;

impl Outbound<Perform<Notify>> for Log {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Perform(op): Perform<Notify>,
    ) -> Result<Self::Ok, Self::Err> {
        log::info!(
            "notify `User(id: {})` about `Booking(id: {})`: {:?}",
            op.recipient,
            op.booking_id,
            op.template,
        );
        Ok(())
    }
}

impl Outbound<Perform<CreateCheckout>> for Log {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Perform(op): Perform<CreateCheckout>,
    ) -> Result<Self::Ok, Self::Err> {
        log::info!(
            "create checkout of {} for `Booking(id: {})` \
             as `Payment(id: {})`",
            op.amount,
            op.booking_id,
            op.payment_id,
        );
        Ok(())
    }
}

impl Outbound<Perform<RequestRefund>> for Log {
    type Ok = refund::Id;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Perform(op): Perform<RequestRefund>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = refund::Id::from(format!("log-{}", Uuid::new_v4()));
        log::info!(
            "request refund of {} on `PaymentIntent(id: {})` \
             (assigned `Refund(id: {id})`)",
            op.amount,
            op.intent_id,
        );
        Ok(id)
    }
}
