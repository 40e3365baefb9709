//! [`Command`] for creating a new [`Booking`].

use common::{
    operations::{By, Commit, Insert, Perform, Select, Transact, Transacted},
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        allocation,
        booking::{self, Fees, SideEffect, Template},
        item, payment, user, Booking, Item, Listing, Payment,
    },
    infra::{database, outbound, Database, Outbound},
    Service,
};

use super::Command;

/// Longest rental window covered by the pricing tiers, in days.
const MAX_RENTAL_DAYS: u64 = 8;

/// [`Command`] for creating a new [`Booking`].
///
/// Allocates a lender, computes the [`Fees`], persists the [`Booking`]
/// together with its pending [`Payment`], and asks the payment processor
/// for a checkout session.
#[derive(Clone, Debug)]
pub struct CreateBooking {
    /// ID of the customer requesting the [`Booking`].
    pub customer_id: user::Id,

    /// ID of the [`Item`] to rent.
    pub item_id: item::Id,

    /// Requested delivery [`allocation::Method`].
    pub method: allocation::Method,

    /// Start of the rental window.
    pub rental_starts_at: booking::RentalStartDateTime,

    /// End of the rental window.
    pub rental_ends_at: booking::RentalEndDateTime,

    /// Insurance fee.
    pub insurance_fee: Money,

    /// Shipping fee, zero for local pickups.
    pub shipping_fee: Money,

    /// Pre-computed promo discount, if any applies.
    pub discount: Option<Money>,
}

impl<Db, Out> Command<CreateBooking> for Service<Db, Out>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Item>, item::Id>>,
            Ok = Option<Item>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Listing>, item::Id>>,
            Ok = Vec<Listing>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<Insert<Booking>, Err = Traced<database::Error>>
        + Database<Insert<Payment>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Out: Outbound<
            Perform<outbound::CreateCheckout>,
            Ok = (),
            Err = Traced<outbound::Error>,
        > + Outbound<
            Perform<outbound::Notify>,
            Ok = (),
            Err = Traced<outbound::Error>,
        >,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let days = cmd
            .rental_starts_at
            .whole_days_until(cmd.rental_ends_at)
            .filter(|days| (1..=MAX_RENTAL_DAYS).contains(days))
            .ok_or(E::InvalidRentalWindow)
            .map_err(tracerr::wrap!())?;
        let tier = allocation::DurationTier::covering(days);

        let item = self
            .database()
            .execute(Select(By::<Option<Item>, _>::new(cmd.item_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ItemNotExists(cmd.item_id))
            .map_err(tracerr::wrap!())?;
        let listings = self
            .database()
            .execute(Select(By::<Vec<Listing>, _>::new(cmd.item_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let lender = allocation::allocate(cmd.method, &item, &listings, tier)
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let fees = Fees::new(
            lender.price,
            cmd.insurance_fee,
            cmd.shipping_fee,
            cmd.discount,
        )
        .ok_or(E::InvalidFees)
        .map_err(tracerr::wrap!())?;

        let mut booking = Booking::new(
            cmd.customer_id,
            cmd.item_id,
            lender,
            cmd.rental_starts_at,
            cmd.rental_ends_at,
            fees,
        );
        let payment = Payment {
            id: payment::Id::new(),
            booking_id: Some(booking.id),
            kind: payment::Kind::Booking,
            intent_id: None,
            amount: fees.total,
            status: payment::Status::Pending,
            created_at: DateTime::now().coerce(),
        };
        booking.payment_id = Some(payment.id);

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Insert(payment.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        // The booking is persisted at this point: a checkout failure is
        // recoverable by a retry, so it never fails the command.
        _ = self
            .outbound()
            .execute(Perform(outbound::CreateCheckout {
                payment_id: payment.id,
                booking_id: booking.id,
                amount: fees.total,
            }))
            .await
            .map_err(|e| {
                log::error!(
                    "failed to create checkout for `Booking(id: {})`: {e}",
                    booking.id,
                );
            });

        self.dispatch(
            &booking,
            vec![SideEffect::NotifyLender(Template::BookingRequested)],
        )
        .await;

        Ok(booking)
    }
}

/// Error of [`CreateBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Lender allocation failed.
    #[display("cannot allocate a lender: {_0}")]
    #[from]
    Allocation(allocation::Error),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Fees`] cannot be computed from the provided amounts.
    #[display("fees cannot be computed from the provided amounts")]
    InvalidFees,

    /// Rental window is empty, inverted or longer than the pricing tiers
    /// cover.
    #[display("invalid rental window")]
    InvalidRentalWindow,

    /// [`Item`] with the provided ID does not exist.
    #[display("`Item(id: {_0})` does not exist")]
    ItemNotExists(#[error(not(source))] item::Id),
}

#[cfg(test)]
mod spec {
    use common::DateTime;

    use crate::{
        command::{
            tests::{reload_payment, seed_item, service, usd, DAY},
            Command as _,
        },
        domain::{
            allocation,
            booking::{DeliveryStatus, PaymentStatus, Template},
            item, payment, user,
        },
    };

    use super::{CreateBooking, ExecutionError};

    fn cmd(item_id: item::Id, rental_days: u32) -> CreateBooking {
        let now = DateTime::now();
        CreateBooking {
            customer_id: user::Id::new(),
            item_id,
            method: allocation::Method::Shipping,
            rental_starts_at: now.coerce(),
            rental_ends_at: (now + rental_days * DAY).coerce(),
            insurance_fee: usd(10),
            shipping_fee: usd(10),
            discount: None,
        }
    }

    #[tokio::test]
    async fn creates_pending_booking_with_checkout() {
        let svc = service();
        let (item_id, lender_id) = seed_item(&svc, 80).await;

        let booking = svc.execute(cmd(item_id, 4)).await.unwrap();

        assert_eq!(booking.delivery_status(), DeliveryStatus::Pending);
        assert_eq!(booking.payment_status(), PaymentStatus::Pending);
        assert_eq!(booking.lender.lender_id, lender_id);
        assert_eq!(booking.fees.total, usd(100));
        assert_eq!(booking.history().len(), 1);

        let payment = reload_payment(&svc, &booking).await;
        assert_eq!(payment.status, payment::Status::Pending);
        assert_eq!(payment.amount, usd(100));
        assert_eq!(payment.booking_id, Some(booking.id));

        let checkouts = svc.outbound().checkouts.lock().unwrap();
        assert_eq!(checkouts.len(), 1);
        assert_eq!(checkouts[0].payment_id, payment.id);
        drop(checkouts);
        assert!(svc
            .outbound()
            .notifications
            .lock()
            .unwrap()
            .iter()
            .any(|n| n.template == Template::BookingRequested));
    }

    #[tokio::test]
    async fn longer_windows_price_by_the_eight_day_tier() {
        let svc = service();
        let (item_id, _) = seed_item(&svc, 80).await;

        let booking = svc.execute(cmd(item_id, 6)).await.unwrap();

        // 160 base for the 8-day tier, plus the 20 in fees.
        assert_eq!(booking.fees.total, usd(180));
    }

    #[tokio::test]
    async fn rejects_invalid_rental_windows() {
        let svc = service();
        let (item_id, _) = seed_item(&svc, 80).await;

        for days in [0, 9] {
            let err = svc.execute(cmd(item_id, days)).await.unwrap_err();
            assert!(matches!(
                err.as_ref(),
                ExecutionError::InvalidRentalWindow,
            ));
        }
    }

    #[tokio::test]
    async fn rejects_unknown_items() {
        let svc = service();

        let err = svc.execute(cmd(item::Id::new(), 4)).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::ItemNotExists(_)));
    }

    #[tokio::test]
    async fn rejects_items_without_eligible_lenders() {
        let svc = service();
        let item_id = item::Id::new();
        // The item exists, but nobody lists it.
        svc.database()
            .execute(common::operations::Insert(crate::domain::Item {
                id: item_id,
                lender_ids: vec![],
            }))
            .await
            .unwrap();

        let err = svc.execute(cmd(item_id, 4)).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Allocation(_)));
    }
}
