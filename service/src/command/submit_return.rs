//! [`Command`] for submitting a return by its single-use token.

use common::{
    operations::{
        By, Commit, Insert, Lock, Perform, Select, Transact, Transacted,
    },
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, return_flow, TransitionError},
        Booking,
    },
    infra::{database, outbound, Database, Outbound},
    Service,
};

use super::Command;

/// [`Command`] for submitting a return of a [`Booking`].
///
/// Authenticated by possession of the single-use return
/// [`return_flow::Token`] alone.
#[derive(Clone, Debug)]
pub struct SubmitReturn {
    /// Return [`return_flow::Token`] the customer submits by.
    pub token: return_flow::Token,

    /// [`return_flow::Method`] the item is returned by.
    pub method: return_flow::Method,

    /// Carrier tracking number, required for
    /// [`return_flow::Method::ExpressShipping`].
    pub tracking_number: Option<return_flow::TrackingNumber>,
}

impl<Db, Out> Command<SubmitReturn> for Service<Db, Out>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Booking>, return_flow::Token>>,
            Ok = Option<Booking>,
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
            Perform<outbound::Notify>,
            Ok = (),
            Err = Traced<outbound::Error>,
        >,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: SubmitReturn,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        if cmd.method == return_flow::Method::ExpressShipping
            && !cmd
                .tracking_number
                .as_ref()
                .is_some_and(|t| !AsRef::<str>::as_ref(t).trim().is_empty())
        {
            return Err(tracerr::new!(E::TrackingNumberRequired));
        }

        let found = self
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(cmd.token.clone())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::TokenNotFound)
            .map_err(tracerr::wrap!())?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<Booking, _>::new(found.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut booking = tx
            .execute(Select(By::<Option<Booking>, _>::new(found.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::TokenNotFound)
            .map_err(tracerr::wrap!())?;
        // Re-check under the lock: the token may have been rotated or
        // consumed by a concurrent submission.
        if booking.return_flow().token.as_ref() != Some(&cmd.token) {
            return Err(tracerr::new!(E::TokenNotFound));
        }
        if booking
            .return_flow()
            .token_expires_at
            .is_some_and(|at| at < DateTime::now().coerce())
        {
            return Err(tracerr::new!(E::TokenExpired));
        }

        let effects = booking
            .submit_return(cmd.method, cmd.tracking_number)
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

/// Error of [`SubmitReturn`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Return cannot be submitted in the [`Booking`]'s current
    /// [`DeliveryStatus`].
    ///
    /// [`DeliveryStatus`]: booking::DeliveryStatus
    #[display("cannot submit the return: {_0}")]
    #[from]
    IllegalTransition(TransitionError),

    /// Provided [`return_flow::Token`] has expired.
    #[display("return token has expired")]
    TokenExpired,

    /// No [`Booking`] holds the provided [`return_flow::Token`].
    #[display("return token not found")]
    TokenNotFound,

    /// Tracking number is missing for an express-shipping return.
    #[display("express-shipping returns require a tracking number")]
    TrackingNumberRequired,
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{
            tests::{deliver, reload, seed_booking, service, store, Recorder},
            Command as _, MarkReturnDue,
        },
        domain::{
            booking::{return_flow, DeliveryStatus, Template},
            Booking,
        },
        infra::InMemory,
        Service,
    };

    use super::{ExecutionError, SubmitReturn};

    /// Seeds a delivered booking with its return link issued, returning it
    /// together with the live token.
    async fn seed_link_sent(
        svc: &Service<InMemory, Recorder>,
        ends_days_ago: u32,
    ) -> (Booking, return_flow::Token) {
        let mut seeded = seed_booking(svc, ends_days_ago).await;
        deliver(&mut seeded);
        store(svc, seeded.clone()).await;
        let booking = svc
            .execute(MarkReturnDue {
                booking_id: seeded.id,
            })
            .await
            .unwrap();
        let token =
            booking.return_flow().token.clone().expect("token minted");
        (booking, token)
    }

    fn tracking(number: &str) -> Option<return_flow::TrackingNumber> {
        Some(return_flow::TrackingNumber::from(number.to_owned()))
    }

    #[tokio::test]
    async fn express_shipping_requires_tracking_number() {
        let svc = service();
        let (_, token) = seed_link_sent(&svc, 0).await;

        for missing in [None, tracking("  ")] {
            let err = svc
                .execute(SubmitReturn {
                    token: token.clone(),
                    method: return_flow::Method::ExpressShipping,
                    tracking_number: missing,
                })
                .await
                .unwrap_err();
            assert!(matches!(
                err.as_ref(),
                ExecutionError::TrackingNumberRequired,
            ));
        }
    }

    #[tokio::test]
    async fn express_shipping_with_tracking_goes_in_transit() {
        let svc = service();
        let (seeded, token) = seed_link_sent(&svc, 0).await;

        let booking = svc
            .execute(SubmitReturn {
                token,
                method: return_flow::Method::ExpressShipping,
                tracking_number: tracking("TRK-123"),
            })
            .await
            .unwrap();

        assert_eq!(booking.delivery_status(), DeliveryStatus::InTransit);
        assert!(booking.reminders_stopped());
        // The token is single-use.
        assert!(booking.return_flow().token.is_none());
        assert!(booking.return_flow().submitted_at.is_some());
        assert!(svc
            .outbound()
            .notifications
            .lock()
            .unwrap()
            .iter()
            .any(|n| n.recipient == seeded.lender.lender_id
                && n.template == Template::ReturnSubmitted));
    }

    #[tokio::test]
    async fn local_drop_off_needs_no_tracking() {
        let svc = service();
        let (seeded, token) = seed_link_sent(&svc, 0).await;

        let booking = svc
            .execute(SubmitReturn {
                token,
                method: return_flow::Method::LocalDropOff,
                tracking_number: None,
            })
            .await
            .unwrap();

        assert_eq!(booking.delivery_status(), DeliveryStatus::DroppedOff);
        assert_eq!(
            reload(&svc, seeded.id).await.delivery_status(),
            DeliveryStatus::DroppedOff,
        );
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let svc = service();
        _ = seed_link_sent(&svc, 0).await;

        let err = svc
            .execute(SubmitReturn {
                token: return_flow::Token::generate(),
                method: return_flow::Method::LocalDropOff,
                tracking_number: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::TokenNotFound));
    }

    #[tokio::test]
    async fn expired_token_is_distinguished_from_unknown() {
        let svc = service();
        // The rental ended 31 days ago, past the 30-day token validity.
        let (_, token) = seed_link_sent(&svc, 31).await;

        let err = svc
            .execute(SubmitReturn {
                token,
                method: return_flow::Method::LocalDropOff,
                tracking_number: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::TokenExpired));
    }

    #[tokio::test]
    async fn consumed_token_cannot_be_replayed() {
        let svc = service();
        let (_, token) = seed_link_sent(&svc, 0).await;
        _ = svc
            .execute(SubmitReturn {
                token: token.clone(),
                method: return_flow::Method::LocalDropOff,
                tracking_number: None,
            })
            .await
            .unwrap();

        let err = svc
            .execute(SubmitReturn {
                token,
                method: return_flow::Method::LocalDropOff,
                tracking_number: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::TokenNotFound));
    }
}
