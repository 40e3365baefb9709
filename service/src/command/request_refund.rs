//! [`Command`] for requesting a refund from the payment processor.

use common::{
    operations::{
        By, Commit, Insert, Lock, Perform, Select, Transact, Transacted,
    },
    Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, history},
        payment, refund, Booking, Payment,
    },
    infra::{database, outbound, Database, Outbound},
    Service,
};

use super::Command;

/// [`Command`] for requesting a refund of a [`Booking`]'s charge.
///
/// Asks the payment processor for the refund and records it as
/// [`refund::Status::Pending`]: finalization happens only once the
/// processor's refund webhook arrives.
#[derive(Clone, Debug)]
pub struct RequestRefund {
    /// ID of the [`Booking`] to refund.
    pub booking_id: booking::Id,

    /// Amount to refund, the whole remaining refundable amount if absent.
    pub amount: Option<Money>,

    /// Reason of the refund, if any.
    pub reason: Option<String>,
}

impl<Db, Out> Command<RequestRefund> for Service<Db, Out>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Payment>, payment::Id>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        >,
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
            Perform<outbound::RequestRefund>,
            Ok = refund::Id,
            Err = Traced<outbound::Error>,
        >,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RequestRefund,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let booking = self
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(cmd.booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(cmd.booking_id))
            .map_err(tracerr::wrap!())?;
        let payment_id = booking
            .payment_id
            .ok_or(E::NotCharged(cmd.booking_id))
            .map_err(tracerr::wrap!())?;
        let intent_id = self
            .database()
            .execute(Select(By::<Option<Payment>, _>::new(payment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .and_then(|p| p.intent_id)
            .ok_or(E::NotCharged(cmd.booking_id))
            .map_err(tracerr::wrap!())?;

        let remaining = booking
            .remaining_refundable()
            .ok_or(E::Refund(booking::RefundError::CurrencyMismatch))
            .map_err(tracerr::wrap!())?;
        let amount = cmd.amount.unwrap_or(remaining);
        let kind = if amount == remaining {
            refund::Kind::Full
        } else {
            refund::Kind::Partial
        };

        // The processor call precedes the transaction: the refund record
        // requires the processor-assigned ID, and `begin_refund()`
        // re-validates the bound under the lock anyway.
        let refund_id = self
            .outbound()
            .execute(Perform(outbound::RequestRefund {
                intent_id,
                amount,
                reason: cmd.reason.clone(),
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

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
        booking
            .begin_refund(
                refund_id,
                amount,
                kind,
                cmd.reason,
                history::Actor::Admin,
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

        Ok(booking)
    }
}

/// Error of [`RequestRefund`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Booking`] has no charged [`Payment`] to refund.
    #[display("`Booking(id: {_0})` has no charged payment")]
    NotCharged(#[error(not(source))] booking::Id),

    /// Payment processor rejected the refund request.
    #[display("refund request failed: {_0}")]
    #[from]
    Processor(outbound::Error),

    /// Refund violates the [`Booking`]'s refund invariants.
    #[display("refund rejected: {_0}")]
    #[from]
    Refund(booking::RefundError),
}
