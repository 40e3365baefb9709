//! [`Booking`] representation exposed over the API.

use common::Money;
use serde::Serialize;
use service::domain::{
    booking::{
        self, history, return_flow, DeliveryStatus, Fees, PaymentStatus,
    },
    item, user, Booking,
};

/// Read-side representation of a [`Booking`].
#[derive(Clone, Debug, Serialize)]
pub struct BookingView {
    /// ID of the [`Booking`].
    pub id: booking::Id,

    /// ID of the customer.
    pub customer_id: user::Id,

    /// ID of the rented item.
    pub item_id: item::Id,

    /// ID of the allocated lender.
    pub lender_id: user::Id,

    /// Start of the rental window.
    pub rental_starts_at: booking::RentalStartDateTime,

    /// End of the rental window.
    pub rental_ends_at: booking::RentalEndDateTime,

    /// Current [`DeliveryStatus`].
    pub delivery_status: DeliveryStatus,

    /// Current [`PaymentStatus`].
    pub payment_status: PaymentStatus,

    /// [`Fees`] of the [`Booking`].
    pub fees: Fees,

    /// Amount still payable to the lender.
    pub lender_payable: Money,

    /// Status history, in append order.
    pub history: Vec<history::Entry>,

    /// Return flow state.
    pub return_flow: ReturnFlowView,
}

/// Return flow state of a [`BookingView`].
///
/// The single-use return token itself never leaves the service.
#[derive(Clone, Debug, Serialize)]
pub struct ReturnFlowView {
    /// When the minted return token expires, if one is live.
    pub token_expires_at: Option<return_flow::TokenExpirationDateTime>,

    /// [`return_flow::Method`] the item was returned by.
    pub method: Option<return_flow::Method>,

    /// Carrier tracking number of a shipped return.
    pub tracking_number: Option<return_flow::TrackingNumber>,

    /// When the customer submitted the return.
    pub submitted_at: Option<return_flow::SubmissionDateTime>,

    /// When the lender confirmed receiving the item back.
    pub received_at: Option<return_flow::ReceiptDateTime>,

    /// Late fee suggested by the overdue escalation.
    pub suggested_late_fee: Option<Money>,

    /// Replacement fee suggested by the overdue escalation.
    pub suggested_replacement_fee: Option<Money>,

    /// Issue reported on the returned item, if any.
    pub issue: Option<return_flow::Issue>,
}

impl From<&Booking> for BookingView {
    fn from(b: &Booking) -> Self {
        let flow = b.return_flow();
        Self {
            id: b.id,
            customer_id: b.customer_id,
            item_id: b.item_id,
            lender_id: b.lender.lender_id,
            rental_starts_at: b.rental_starts_at,
            rental_ends_at: b.rental_ends_at,
            delivery_status: b.delivery_status(),
            payment_status: b.payment_status(),
            fees: b.fees,
            lender_payable: b.lender_payable(),
            history: b.history().iter().cloned().collect(),
            return_flow: ReturnFlowView {
                token_expires_at: flow.token_expires_at,
                method: flow.method,
                tracking_number: flow.tracking_number.clone(),
                submitted_at: flow.submitted_at,
                received_at: flow.received_at,
                suggested_late_fee: flow.suggested_late_fee,
                suggested_replacement_fee: flow.suggested_replacement_fee,
                issue: flow.issue.clone(),
            },
        }
    }
}
