//! [`Command`] for marking a [`Booking`]'s return as due.

use common::operations::{
    By, Commit, Insert, Lock, Perform, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, history, DeliveryStatus, TransitionError},
        Booking,
    },
    infra::{database, outbound, Database, Outbound},
    Service,
};

use super::Command;

/// [`Command`] for marking a [`Booking`]'s return as due.
///
/// Mints the single-use return token (rotating any previous one), advances
/// the booking through [`DeliveryStatus::ReturnDue`] into
/// [`DeliveryStatus::ReturnLinkSent`], and counts the return link as the
/// first reminder.
#[derive(Clone, Copy, Debug)]
pub struct MarkReturnDue {
    /// ID of the [`Booking`] whose return is due.
    pub booking_id: booking::Id,
}

impl<Db, Out> Command<MarkReturnDue> for Service<Db, Out>
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
        cmd: MarkReturnDue,
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

        let mut effects = booking
            .transition(
                DeliveryStatus::ReturnDue,
                history::Actor::Scheduler,
                "rental window ended",
            )
            .map_err(tracerr::from_and_wrap!(=> E))?;
        let _token = booking.mint_return_token();
        effects.extend(
            booking
                .transition(
                    DeliveryStatus::ReturnLinkSent,
                    history::Actor::Scheduler,
                    "return link sent",
                )
                .map_err(tracerr::from_and_wrap!(=> E))?,
        );
        // The return link itself counts as the first reminder.
        booking.record_reminder_sent();

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

/// Error of [`MarkReturnDue`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Return of the [`Booking`] cannot become due in its current
    /// [`DeliveryStatus`].
    #[display("cannot mark the return as due: {_0}")]
    #[from]
    IllegalTransition(TransitionError),
}
