//! [`DeliveryStatus`] and [`PaymentStatus`] of a booking.

use common::define_kind;

#[cfg(doc)]
use crate::domain::Booking;

define_kind! {
    #[doc = "Operational lifecycle status of a [`Booking`]."]
    enum DeliveryStatus {
        #[doc = "Awaiting the lender's decision."]
        Pending = 1,

        #[doc = "Lender accepted the booking."]
        AcceptedByLender = 2,

        #[doc = "Lender rejected the booking."]
        RejectedByLender = 3,

        #[doc = "Charge failed, a payment retry is scheduled."]
        PaymentRetryScheduled = 4,

        #[doc = "Lender is preparing the shipment."]
        PreparingShipment = 10,

        #[doc = "Shipping label is ready."]
        LabelReady = 11,

        #[doc = "Item is on its way to the customer."]
        ShippedToCustomer = 12,

        #[doc = "Item is in possession of the customer."]
        Delivered = 13,

        #[doc = "Return window opened."]
        ReturnDue = 20,

        #[doc = "Return link was sent to the customer."]
        ReturnLinkSent = 21,

        #[doc = "Customer shipped the item back."]
        InTransit = 22,

        #[doc = "Customer dropped the item off locally."]
        DroppedOff = 23,

        #[doc = "Lender confirmed receiving the item back."]
        ReceivedByLender = 24,

        #[doc = "Booking completed."]
        Completed = 25,

        #[doc = "Return is 1-4 days late."]
        LateReturn = 30,

        #[doc = "Return is 5-9 days late."]
        Overdue = 31,

        #[doc = "Return is 10-14 days late."]
        Escalated = 32,

        #[doc = "Return is 15-29 days late."]
        HighRisk = 33,

        #[doc = "Return is 30+ days late, treated as not returned."]
        NonReturned = 34,

        #[doc = "Cancelled by the customer before lender acceptance."]
        CancelledByCustomer = 40,

        #[doc = "Cancelled by the lender."]
        CancelledByLender = 41,

        #[doc = "Cancelled by an administrator."]
        CancelledByAdmin = 42,

        #[doc = "Under a dispute, excluded from automation."]
        Disputed = 43,

        #[doc = "Lender reported an issue with the returned item."]
        IssueReported = 44,
    }
}

impl DeliveryStatus {
    /// Indicates whether a transition from this [`DeliveryStatus`] into the
    /// provided one is legal.
    ///
    /// The transition set is fixed and domain-specific; everything not
    /// listed here is illegal.
    #[must_use]
    pub fn may_transition_to(self, to: Self) -> bool {
        use DeliveryStatus as S;

        // Any not-yet-settled return may be escalated to a strictly higher
        // tier, or settled by the customer/lender at any tier.
        if self.is_awaiting_return() {
            let settles = matches!(
                to,
                S::InTransit | S::DroppedOff | S::ReceivedByLender | S::Disputed
            );
            let escalates = to
                .escalation_tier()
                .is_some_and(|tier| self.escalation_tier().unwrap_or(0) < tier);
            if settles || escalates {
                return true;
            }
        }

        match self {
            S::Pending => matches!(
                to,
                S::AcceptedByLender
                    | S::RejectedByLender
                    | S::PaymentRetryScheduled
                    | S::CancelledByCustomer
                    | S::CancelledByAdmin
            ),
            S::PaymentRetryScheduled => matches!(
                to,
                S::Pending
                    | S::AcceptedByLender
                    | S::CancelledByCustomer
                    | S::CancelledByAdmin
            ),
            S::AcceptedByLender => matches!(
                to,
                S::PreparingShipment
                    | S::LabelReady
                    | S::Delivered
                    | S::CancelledByLender
                    | S::CancelledByAdmin
                    | S::Disputed
            ),
            S::PreparingShipment => matches!(
                to,
                S::LabelReady
                    | S::ShippedToCustomer
                    | S::CancelledByAdmin
                    | S::Disputed
            ),
            S::LabelReady => matches!(
                to,
                S::ShippedToCustomer | S::CancelledByAdmin | S::Disputed
            ),
            S::ShippedToCustomer => matches!(to, S::Delivered | S::Disputed),
            S::Delivered => matches!(to, S::ReturnDue | S::Disputed),
            S::ReturnDue => matches!(to, S::ReturnLinkSent),
            S::InTransit | S::DroppedOff => matches!(
                to,
                S::ReceivedByLender | S::IssueReported | S::Disputed
            ),
            S::ReceivedByLender => {
                matches!(to, S::Completed | S::IssueReported)
            }
            S::ReturnLinkSent
            | S::LateReturn
            | S::Overdue
            | S::Escalated
            | S::HighRisk
            | S::NonReturned
            | S::RejectedByLender
            | S::Completed
            | S::CancelledByCustomer
            | S::CancelledByLender
            | S::CancelledByAdmin
            | S::Disputed
            | S::IssueReported => false,
        }
    }

    /// Returns the overdue-escalation tier this [`DeliveryStatus`]
    /// represents, if any.
    #[must_use]
    pub fn escalation_tier(self) -> Option<u8> {
        match self {
            Self::LateReturn => Some(1),
            Self::Overdue => Some(2),
            Self::Escalated => Some(3),
            Self::HighRisk => Some(4),
            Self::NonReturned => Some(5),
            Self::Pending
            | Self::AcceptedByLender
            | Self::RejectedByLender
            | Self::PaymentRetryScheduled
            | Self::PreparingShipment
            | Self::LabelReady
            | Self::ShippedToCustomer
            | Self::Delivered
            | Self::ReturnDue
            | Self::ReturnLinkSent
            | Self::InTransit
            | Self::DroppedOff
            | Self::ReceivedByLender
            | Self::Completed
            | Self::CancelledByCustomer
            | Self::CancelledByLender
            | Self::CancelledByAdmin
            | Self::Disputed
            | Self::IssueReported => None,
        }
    }

    /// Indicates whether a return is still awaited in this
    /// [`DeliveryStatus`].
    #[must_use]
    pub fn is_awaiting_return(self) -> bool {
        matches!(
            self,
            Self::ReturnDue
                | Self::ReturnLinkSent
                | Self::LateReturn
                | Self::Overdue
                | Self::Escalated
                | Self::HighRisk
                | Self::NonReturned
        )
    }

    /// Indicates whether this [`DeliveryStatus`] settles the return flow:
    /// no return automation (reminders, escalation) applies anymore.
    #[must_use]
    pub fn is_return_settled(self) -> bool {
        matches!(
            self,
            Self::ReceivedByLender
                | Self::Completed
                | Self::RejectedByLender
                | Self::CancelledByCustomer
                | Self::CancelledByLender
                | Self::CancelledByAdmin
                | Self::Disputed
                | Self::IssueReported
        )
    }
}

define_kind! {
    #[doc = "Payment status of a [`Booking`]."]
    enum PaymentStatus {
        #[doc = "Checkout initiated, outcome unknown yet."]
        Pending = 1,

        #[doc = "Charge failed, a retry is awaited."]
        RetryPending = 2,

        #[doc = "Refund requested, processor confirmation awaited."]
        RefundPending = 3,

        #[doc = "Charge succeeded."]
        Paid = 4,

        #[doc = "Charge failed."]
        Failed = 5,

        #[doc = "Charge was fully refunded."]
        Refunded = 6,

        #[doc = "Charge was partially refunded."]
        PartiallyRefunded = 7,

        #[doc = "Booking will not be charged."]
        NotCharged = 8,
    }
}

impl PaymentStatus {
    /// Indicates whether this [`PaymentStatus`] is terminal: allocation
    /// fields and the rental window of the booking are immutable once a
    /// terminal status is reached.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Paid
                | Self::Refunded
                | Self::PartiallyRefunded
                | Self::NotCharged
        )
    }

    /// Indicates whether this [`PaymentStatus`] reflects a successfully
    /// settled charge (possibly refunded afterwards).
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            Self::Paid
                | Self::Refunded
                | Self::PartiallyRefunded
                | Self::RefundPending
        )
    }
}

#[cfg(test)]
mod spec {
    use super::DeliveryStatus as S;

    #[test]
    fn pending_may_be_cancelled_by_customer() {
        assert!(S::Pending.may_transition_to(S::CancelledByCustomer));
        assert!(!S::AcceptedByLender.may_transition_to(S::CancelledByCustomer));
        assert!(!S::Delivered.may_transition_to(S::CancelledByCustomer));
    }

    #[test]
    fn escalation_only_climbs() {
        assert!(S::ReturnLinkSent.may_transition_to(S::Escalated));
        assert!(S::LateReturn.may_transition_to(S::Overdue));
        assert!(S::LateReturn.may_transition_to(S::HighRisk));
        assert!(!S::Overdue.may_transition_to(S::LateReturn));
        assert!(!S::HighRisk.may_transition_to(S::Escalated));
    }

    #[test]
    fn escalated_returns_may_still_settle() {
        assert!(S::HighRisk.may_transition_to(S::InTransit));
        assert!(S::NonReturned.may_transition_to(S::ReceivedByLender));
        assert!(!S::Completed.may_transition_to(S::InTransit));
    }

    #[test]
    fn terminal_statuses_have_no_successors() {
        for terminal in [
            S::Completed,
            S::CancelledByCustomer,
            S::CancelledByLender,
            S::CancelledByAdmin,
            S::IssueReported,
        ] {
            for to in [
                S::Pending,
                S::AcceptedByLender,
                S::Delivered,
                S::ReturnDue,
                S::InTransit,
                S::Completed,
            ] {
                assert!(
                    !terminal.may_transition_to(to),
                    "{terminal} -> {to} must be illegal",
                );
            }
        }
    }
}
