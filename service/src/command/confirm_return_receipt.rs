//! [`Command`] for confirming a return receipt by the lender.

use common::operations::{
    By, Commit, Insert, Lock, Perform, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, TransitionError},
        user, Booking,
    },
    infra::{database, outbound, Database, Outbound},
    Service,
};

use super::Command;

/// [`Command`] for confirming by the lender that the rented item came back.
///
/// Stops return reminders permanently and completes the [`Booking`].
#[derive(Clone, Copy, Debug)]
pub struct ConfirmReturnReceipt {
    /// ID of the [`Booking`] whose return came back.
    pub booking_id: booking::Id,

    /// ID of the lender confirming the receipt.
    pub lender_id: user::Id,
}

impl<Db, Out> Command<ConfirmReturnReceipt> for Service<Db, Out>
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
        cmd: ConfirmReturnReceipt,
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
            .confirm_return_receipt()
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

/// Error of [`ConfirmReturnReceipt`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Return receipt cannot be confirmed in the [`Booking`]'s current
    /// [`DeliveryStatus`].
    ///
    /// [`DeliveryStatus`]: booking::DeliveryStatus
    #[display("cannot confirm the return receipt: {_0}")]
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
            tests::{deliver, seed_booking, service, store, Recorder},
            Command as _, MarkReturnDue, SubmitReturn,
        },
        domain::{
            booking::{return_flow, DeliveryStatus, Template},
            user, Booking,
        },
        infra::InMemory,
        Service,
    };

    use super::{ConfirmReturnReceipt, ExecutionError};

    /// Seeds a booking whose return was just dropped off.
    async fn seed_dropped_off(
        svc: &Service<InMemory, Recorder>,
    ) -> Booking {
        let mut seeded = seed_booking(svc, 0).await;
        deliver(&mut seeded);
        store(svc, seeded.clone()).await;
        let booking = svc
            .execute(MarkReturnDue {
                booking_id: seeded.id,
            })
            .await
            .unwrap();
        svc.execute(SubmitReturn {
            token: booking.return_flow().token.clone().unwrap(),
            method: return_flow::Method::LocalDropOff,
            tracking_number: None,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn receipt_completes_the_booking() {
        let svc = service();
        let seeded = seed_dropped_off(&svc).await;

        let booking = svc
            .execute(ConfirmReturnReceipt {
                booking_id: seeded.id,
                lender_id: seeded.lender.lender_id,
            })
            .await
            .unwrap();

        assert_eq!(booking.delivery_status(), DeliveryStatus::Completed);
        assert!(booking.return_flow().received_at.is_some());
        assert!(booking.reminders_stopped());
        let notifications = svc.outbound().notifications.lock().unwrap();
        assert!(notifications.iter().any(|n| {
            n.recipient == seeded.customer_id
                && n.template == Template::ReturnReceived
        }));
        assert!(notifications.iter().any(|n| {
            n.recipient == seeded.customer_id
                && n.template == Template::BookingCompleted
        }));
    }

    #[tokio::test]
    async fn rejects_strangers() {
        let svc = service();
        let seeded = seed_dropped_off(&svc).await;

        let err = svc
            .execute(ConfirmReturnReceipt {
                booking_id: seeded.id,
                lender_id: user::Id::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::NotAllocatedLender(_),
        ));
    }

    #[tokio::test]
    async fn conflicts_before_submission() {
        let svc = service();
        let seeded = seed_booking(&svc, 0).await;

        let err = svc
            .execute(ConfirmReturnReceipt {
                booking_id: seeded.id,
                lender_id: seeded.lender.lender_id,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::IllegalTransition(_),
        ));
    }
}
