//! [`Command`] for rejecting a [`Booking`] by its allocated lender.

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

/// [`Command`] for rejecting a [`Booking`] by its allocated lender.
///
/// Rejection settles the booking: reminder and escalation sweeps skip it
/// from that point on.
#[derive(Clone, Debug)]
pub struct RejectBooking {
    /// ID of the [`Booking`] to reject.
    pub booking_id: booking::Id,

    /// ID of the lender rejecting the [`Booking`].
    pub lender_id: user::Id,

    /// Lender-supplied rejection reason.
    pub reason: String,
}

impl<Db, Out> Command<RejectBooking> for Service<Db, Out>
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
        cmd: RejectBooking,
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
                DeliveryStatus::RejectedByLender,
                history::Actor::Lender,
                &cmd.reason,
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

/// Error of [`RejectBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Booking`] cannot be rejected in its current [`DeliveryStatus`].
    #[display("cannot reject the booking: {_0}")]
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
        domain::booking::{DeliveryStatus, Template},
    };

    use super::RejectBooking;

    #[tokio::test]
    async fn lender_rejects_pending_booking() {
        let svc = service();
        let seeded = seed_booking(&svc, 0).await;

        let booking = svc
            .execute(RejectBooking {
                booking_id: seeded.id,
                lender_id: seeded.lender.lender_id,
                reason: "item is under repair".into(),
            })
            .await
            .unwrap();

        assert_eq!(
            booking.delivery_status(),
            DeliveryStatus::RejectedByLender,
        );
        let reloaded = reload(&svc, seeded.id).await;
        assert_eq!(
            reloaded.history().last().map(|e| e.reason.as_str()),
            Some("item is under repair"),
        );
        assert!(svc
            .outbound()
            .notifications
            .lock()
            .unwrap()
            .iter()
            .any(|n| n.recipient == seeded.customer_id
                && n.template == Template::BookingRejected));
    }

    #[tokio::test]
    async fn rejection_settles_the_booking_for_sweeps() {
        let svc = service();
        let seeded = seed_booking(&svc, 0).await;

        _ = svc
            .execute(RejectBooking {
                booking_id: seeded.id,
                lender_id: seeded.lender.lender_id,
                reason: "unavailable".into(),
            })
            .await
            .unwrap();

        assert!(reload(&svc, seeded.id).await.reminders_stopped());
    }
}
