//! [`Command`] for reporting an issue with a returned item.

use common::operations::{
    By, Commit, Insert, Lock, Perform, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, return_flow, TransitionError},
        user, Booking,
    },
    infra::{database, outbound, Database, Outbound},
    Service,
};

use super::Command;

/// [`Command`] for reporting by the lender an issue with the returned item.
///
/// Takes the [`Booking`] out of the automated flow: a human resolves it
/// from there.
#[derive(Clone, Debug)]
pub struct ReportReturnIssue {
    /// ID of the [`Booking`] the issue is reported on.
    pub booking_id: booking::Id,

    /// ID of the lender reporting the issue.
    pub lender_id: user::Id,

    /// Reported [`return_flow::Issue`].
    pub issue: return_flow::Issue,
}

impl<Db, Out> Command<ReportReturnIssue> for Service<Db, Out>
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
        cmd: ReportReturnIssue,
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
            .report_return_issue(cmd.issue)
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

/// Error of [`ReportReturnIssue`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Issue cannot be reported in the [`Booking`]'s current
    /// [`DeliveryStatus`].
    ///
    /// [`DeliveryStatus`]: booking::DeliveryStatus
    #[display("cannot report a return issue: {_0}")]
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
            tests::{deliver, seed_booking, service, store},
            Command as _, MarkReturnDue, SubmitReturn,
        },
        domain::booking::{return_flow, DeliveryStatus, Template},
    };

    use super::ReportReturnIssue;

    #[tokio::test]
    async fn reported_issue_halts_the_automated_flow() {
        let svc = service();
        let mut seeded = seed_booking(&svc, 0).await;
        deliver(&mut seeded);
        store(&svc, seeded.clone()).await;
        let booking = svc
            .execute(MarkReturnDue {
                booking_id: seeded.id,
            })
            .await
            .unwrap();
        let booking = svc
            .execute(SubmitReturn {
                token: booking.return_flow().token.clone().unwrap(),
                method: return_flow::Method::LocalDropOff,
                tracking_number: None,
            })
            .await
            .unwrap();

        let booking = svc
            .execute(ReportReturnIssue {
                booking_id: booking.id,
                lender_id: seeded.lender.lender_id,
                issue: return_flow::Issue {
                    kind: return_flow::issue::Kind::Damaged,
                    notes: "cracked lens".into(),
                },
            })
            .await
            .unwrap();

        assert_eq!(booking.delivery_status(), DeliveryStatus::IssueReported);
        assert!(matches!(
            booking.return_flow().issue,
            Some(return_flow::Issue {
                kind: return_flow::issue::Kind::Damaged,
                ..
            }),
        ));
        assert!(booking.reminders_stopped());
        assert!(svc
            .outbound()
            .notifications
            .lock()
            .unwrap()
            .iter()
            .any(|n| n.template == Template::IssueReported));
    }
}
