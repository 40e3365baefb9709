//! [`Command`] for cancelling a [`Booking`] by its customer.

use common::operations::{
    By, Commit, Insert, Lock, Perform, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, history, DeliveryStatus, TransitionError},
        user, Booking,
    },
    infra::{database, outbound, Database, Outbound},
    Service,
};

use super::Command;

/// [`Command`] for cancelling a [`Booking`] by its customer.
///
/// Customers may cancel while the booking is still pending only: once the
/// lender has accepted, cancellation requires an admin.
#[derive(Clone, Copy, Debug)]
pub struct CancelBooking {
    /// ID of the [`Booking`] to cancel.
    pub booking_id: booking::Id,

    /// ID of the customer cancelling the [`Booking`].
    pub customer_id: user::Id,
}

impl<Db, Out> Command<CancelBooking> for Service<Db, Out>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Booking, booking::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<Insert<Booking>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Out: Outbound<
            Perform<outbound::Notify>,
            Ok = (),
            Err = Traced<outbound::Error>,
        >,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CancelBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<Booking, _>::new(cmd.booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut booking = tx
            .execute(Select(By::<Option<Booking>, _>::new(cmd.booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(cmd.booking_id))
            .map_err(tracerr::wrap!())?;
        if booking.customer_id != cmd.customer_id {
            return Err(tracerr::new!(E::NotBookingCustomer(cmd.customer_id)));
        }

        let effects = booking
            .transition(
                DeliveryStatus::CancelledByCustomer,
                history::Actor::Customer,
                "cancelled by the customer",
            )
            .map_err(tracerr::from_and_wrap!(=> E))?;

        tx.execute(Insert(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.dispatch(&booking, effects).await;

        Ok(booking)
    }
}

/// Error of [`CancelBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Booking`] cannot be cancelled in its current [`DeliveryStatus`].
    #[display("cannot cancel the booking: {_0}")]
    #[from]
    IllegalTransition(TransitionError),

    /// Acting customer is not the one who requested the [`Booking`].
    #[display("`User(id: {_0})` is not the booking's customer")]
    NotBookingCustomer(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{
            tests::{reload, seed_booking, service},
            AcceptBooking, Command as _,
        },
        domain::{
            booking::{DeliveryStatus, Template},
            user,
        },
    };

    use super::{CancelBooking, ExecutionError};

    #[tokio::test]
    async fn customer_cancels_pending_booking() {
        let svc = service();
        let seeded = seed_booking(&svc, 0).await;

        let booking = svc
            .execute(CancelBooking {
                booking_id: seeded.id,
                customer_id: seeded.customer_id,
            })
            .await
            .unwrap();

        assert_eq!(
            booking.delivery_status(),
            DeliveryStatus::CancelledByCustomer,
        );
        assert!(svc
            .outbound()
            .notifications
            .lock()
            .unwrap()
            .iter()
            .any(|n| n.recipient == seeded.lender.lender_id
                && n.template == Template::BookingCancelled));
    }

    #[tokio::test]
    async fn cancellation_after_acceptance_conflicts() {
        let svc = service();
        let seeded = seed_booking(&svc, 0).await;
        _ = svc
            .execute(AcceptBooking {
                booking_id: seeded.id,
                lender_id: seeded.lender.lender_id,
            })
            .await
            .unwrap();

        let err = svc
            .execute(CancelBooking {
                booking_id: seeded.id,
                customer_id: seeded.customer_id,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::IllegalTransition(_),
        ));
        assert_eq!(
            reload(&svc, seeded.id).await.delivery_status(),
            DeliveryStatus::AcceptedByLender,
        );
    }

    #[tokio::test]
    async fn rejects_strangers() {
        let svc = service();
        let seeded = seed_booking(&svc, 0).await;

        let err = svc
            .execute(CancelBooking {
                booking_id: seeded.id,
                customer_id: user::Id::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::NotBookingCustomer(_),
        ));
    }
}
