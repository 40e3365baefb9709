//! [`Command`] definition.

pub mod accept_booking;
pub mod apply_payment_event;
pub mod cancel_booking;
pub mod confirm_return_receipt;
pub mod create_booking;
pub mod mark_return_due;
pub mod reject_booking;
pub mod report_return_issue;
pub mod request_refund;
pub mod submit_return;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    accept_booking::AcceptBooking, apply_payment_event::ApplyPaymentEvent,
    cancel_booking::CancelBooking,
    confirm_return_receipt::ConfirmReturnReceipt,
    create_booking::CreateBooking, mark_return_due::MarkReturnDue,
    reject_booking::RejectBooking, report_return_issue::ReportReturnIssue,
    request_refund::RequestRefund, submit_return::SubmitReturn,
};

#[cfg(test)]
pub(crate) mod tests {
    //! Shared fixtures for [`Command`] tests.

    use std::{
        sync::{
            atomic::{AtomicU64, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };

    use common::{
        money::Currency,
        operations::{By, Insert, Perform, Select},
        DateTime, Money,
    };
    use rust_decimal::Decimal;
    use tracerr::Traced;

    use crate::{
        domain::{
            booking::{self, Fees},
            item,
            lender::{self, AllocatedLender},
            payment, refund, user, Booking, Item, Listing, Payment,
        },
        infra::{outbound, Database as _, InMemory},
        Config, Service,
    };

    /// One day of test time.
    pub(crate) const DAY: Duration = Duration::from_secs(60 * 60 * 24);

    /// [`outbound::Outbound`] implementation recording every operation
    /// instead of delivering it.
    #[derive(Clone, Debug, Default)]
    pub(crate) struct Recorder {
        /// Recorded [`outbound::Notify`] operations.
        pub(crate) notifications: Arc<Mutex<Vec<outbound::Notify>>>,

        /// Recorded [`outbound::CreateCheckout`] operations.
        pub(crate) checkouts: Arc<Mutex<Vec<outbound::CreateCheckout>>>,

        /// Recorded [`outbound::RequestRefund`] operations.
        pub(crate) refunds: Arc<Mutex<Vec<outbound::RequestRefund>>>,

        /// Counter feeding the fabricated [`refund::Id`]s.
        refund_seq: Arc<AtomicU64>,
    }

    impl outbound::Outbound<Perform<outbound::Notify>> for Recorder {
        type Ok = ();
        type Err = Traced<outbound::Error>;

        async fn execute(
            &self,
            Perform(op): Perform<outbound::Notify>,
        ) -> Result<Self::Ok, Self::Err> {
            self.notifications.lock().unwrap().push(op);
            Ok(())
        }
    }

    impl outbound::Outbound<Perform<outbound::CreateCheckout>> for Recorder {
        type Ok = ();
        type Err = Traced<outbound::Error>;

        async fn execute(
            &self,
            Perform(op): Perform<outbound::CreateCheckout>,
        ) -> Result<Self::Ok, Self::Err> {
            self.checkouts.lock().unwrap().push(op);
            Ok(())
        }
    }

    impl outbound::Outbound<Perform<outbound::RequestRefund>> for Recorder {
        type Ok = refund::Id;
        type Err = Traced<outbound::Error>;

        async fn execute(
            &self,
            Perform(op): Perform<outbound::RequestRefund>,
        ) -> Result<Self::Ok, Self::Err> {
            self.refunds.lock().unwrap().push(op);
            let seq = self.refund_seq.fetch_add(1, Ordering::Relaxed);
            Ok(refund::Id::from(format!("re_test_{seq}")))
        }
    }

    /// Creates a [`Service`] over an empty [`InMemory`] database and a
    /// [`Recorder`] outbound.
    pub(crate) fn service() -> Service<InMemory, Recorder> {
        Service {
            config: Config::default(),
            database: InMemory::new(),
            outbound: Recorder::default(),
        }
    }

    pub(crate) fn usd(amount: i64) -> Money {
        Money {
            amount: Decimal::new(amount, 0),
            currency: Currency::Usd,
        }
    }

    /// Seeds an [`Item`] offered by a single lender with one eligible
    /// [`Listing`], returning the item and the lender IDs.
    pub(crate) async fn seed_item(
        svc: &Service<InMemory, Recorder>,
        price_four_days: i64,
    ) -> (item::Id, user::Id) {
        let item_id = item::Id::new();
        let lender_id = user::Id::new();
        svc.database()
            .execute(Insert(Item {
                id: item_id,
                lender_ids: vec![lender_id],
            }))
            .await
            .unwrap();
        svc.database()
            .execute(Insert(Listing {
                id: lender::Id::new(),
                lender_id,
                item_id,
                price_four_days: usd(price_four_days),
                price_eight_days: usd(price_four_days * 2),
                is_active: true,
                is_approved: true,
                pickup_point: None,
            }))
            .await
            .unwrap();
        (item_id, lender_id)
    }

    /// Seeds a pending [`Booking`] with its pending [`Payment`], its
    /// rental window ending the provided number of days ago.
    pub(crate) async fn seed_booking(
        svc: &Service<InMemory, Recorder>,
        ends_days_ago: u32,
    ) -> Booking {
        let now = DateTime::now();
        let lender = AllocatedLender {
            lender_id: user::Id::new(),
            price: usd(80),
            kind: lender::Kind::Shipping,
            point: None,
            allocated_at: now.coerce(),
        };
        let mut booking = Booking::new(
            user::Id::new(),
            item::Id::new(),
            lender,
            (now - (ends_days_ago + 4) * DAY).coerce(),
            (now - ends_days_ago * DAY).coerce(),
            Fees::new(usd(80), usd(10), usd(10), None).unwrap(),
        );
        let payment = Payment {
            id: payment::Id::new(),
            booking_id: Some(booking.id),
            kind: payment::Kind::Booking,
            intent_id: None,
            amount: booking.fees.total,
            status: payment::Status::Pending,
            created_at: now.coerce(),
        };
        booking.payment_id = Some(payment.id);

        svc.database().execute(Insert(booking.clone())).await.unwrap();
        svc.database().execute(Insert(payment)).await.unwrap();
        booking
    }

    /// Advances the provided pending [`Booking`] in place into a paid,
    /// delivered one.
    pub(crate) fn deliver(booking: &mut Booking) {
        use crate::domain::booking::{history::Actor, DeliveryStatus};

        _ = booking.record_payment(
            crate::domain::booking::PaymentStatus::Paid,
            Actor::PaymentProcessor,
            "charge confirmed",
        );
        for to in [
            DeliveryStatus::AcceptedByLender,
            DeliveryStatus::PreparingShipment,
            DeliveryStatus::ShippedToCustomer,
            DeliveryStatus::Delivered,
        ] {
            _ = booking
                .transition(to, Actor::Scheduler, "test walk")
                .expect("legal walk");
        }
    }

    /// Persists the provided [`Booking`] as-is.
    pub(crate) async fn store(
        svc: &Service<InMemory, Recorder>,
        booking: Booking,
    ) {
        svc.database().execute(Insert(booking)).await.unwrap();
    }

    /// Reloads the provided [`Booking`] from the database.
    pub(crate) async fn reload(
        svc: &Service<InMemory, Recorder>,
        id: booking::Id,
    ) -> Booking {
        svc.database()
            .execute(Select(By::<Option<Booking>, _>::new(id)))
            .await
            .unwrap()
            .expect("booking exists")
    }

    /// Reloads the [`Payment`] of the provided [`Booking`].
    pub(crate) async fn reload_payment(
        svc: &Service<InMemory, Recorder>,
        booking: &Booking,
    ) -> Payment {
        svc.database()
            .execute(Select(By::<Option<Payment>, _>::new(
                booking.payment_id.expect("payment linked"),
            )))
            .await
            .unwrap()
            .expect("payment exists")
    }
}
