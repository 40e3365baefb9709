//! [`Command`] for accepting a [`Booking`] by its allocated lender.

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

/// [`Command`] for accepting a [`Booking`] by its allocated lender.
#[derive(Clone, Copy, Debug)]
pub struct AcceptBooking {
    /// ID of the [`Booking`] to accept.
    pub booking_id: booking::Id,

    /// ID of the lender accepting the [`Booking`].
    pub lender_id: user::Id,
}

impl<Db, Out> Command<AcceptBooking> for Service<Db, Out>
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
        cmd: AcceptBooking,
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
        if booking.lender.lender_id != cmd.lender_id {
            return Err(tracerr::new!(E::NotAllocatedLender(cmd.lender_id)));
        }

        let effects = booking
            .transition(
                DeliveryStatus::AcceptedByLender,
                history::Actor::Lender,
                "accepted by the lender",
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

/// Error of [`AcceptBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Booking`] cannot be accepted in its current [`DeliveryStatus`].
    #[display("cannot accept the booking: {_0}")]
    #[from]
    IllegalTransition(TransitionError),

    /// Acting lender is not the one allocated to the [`Booking`].
    #[display("`User(id: {_0})` is not the allocated lender")]
    NotAllocatedLender(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{
            tests::{reload, seed_booking, service},
            Command as _,
        },
        domain::{
            booking::{DeliveryStatus, Template},
            user,
        },
    };

    use super::{AcceptBooking, ExecutionError};

    #[tokio::test]
    async fn lender_accepts_pending_booking() {
        let svc = service();
        let seeded = seed_booking(&svc, 0).await;

        let booking = svc
            .execute(AcceptBooking {
                booking_id: seeded.id,
                lender_id: seeded.lender.lender_id,
            })
            .await
            .unwrap();

        assert_eq!(
            booking.delivery_status(),
            DeliveryStatus::AcceptedByLender,
        );
        assert_eq!(
            reload(&svc, seeded.id).await.delivery_status(),
            DeliveryStatus::AcceptedByLender,
        );
        let notifications = svc.outbound().notifications.lock().unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].recipient, seeded.customer_id);
        assert_eq!(notifications[0].template, Template::BookingAccepted);
    }

    #[tokio::test]
    async fn rejects_strangers() {
        let svc = service();
        let seeded = seed_booking(&svc, 0).await;

        let err = svc
            .execute(AcceptBooking {
                booking_id: seeded.id,
                lender_id: user::Id::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::NotAllocatedLender(_),
        ));
        assert_eq!(
            reload(&svc, seeded.id).await.delivery_status(),
            DeliveryStatus::Pending,
        );
    }

    #[tokio::test]
    async fn double_acceptance_conflicts() {
        let svc = service();
        let seeded = seed_booking(&svc, 0).await;
        let accept = AcceptBooking {
            booking_id: seeded.id,
            lender_id: seeded.lender.lender_id,
        };

        _ = svc.execute(accept).await.unwrap();
        let err = svc.execute(accept).await.unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::IllegalTransition(_),
        ));
    }
}
