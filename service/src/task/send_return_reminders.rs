//! [`SendReturnReminders`] [`Task`].

use std::{convert::Infallible, error::Error, ops::RangeInclusive, time};

use common::{
    operations::{
        By, Commit, Insert, Lock, Perform, Select, Start, Transact,
        Transacted,
    },
    DateTime,
};
use derive_more::{Display, Error as StdError, From};
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    command::{self, Command, MarkReturnDue},
    domain::{
        booking::{self, DeliveryStatus, SideEffect, Template},
        Booking,
    },
    infra::{database, outbound, Database, Outbound},
    read::booking::ReturnPending,
    Service,
};

use super::Task;

/// One day.
const DAY: time::Duration = time::Duration::from_secs(24 * 60 * 60);

/// Configuration for [`SendReturnReminders`] [`Task`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Interval between reminder sweeps.
    pub interval: time::Duration,

    /// Whether return reminders are sent at all.
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: DAY,
            enabled: true,
        }
    }
}

/// [`Task`] for reminding customers of approaching returns.
///
/// Sweeps the [`Booking`]s whose rental window ends within the next two
/// days (or ended today): upcoming ones receive a heads-up, due ones
/// receive their return link via [`MarkReturnDue`].
#[derive(Clone, Copy, Debug)]
pub struct SendReturnReminders<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db, Out> Task<Start<By<SendReturnReminders<Self>, Config>>>
    for Service<Db, Out>
where
    SendReturnReminders<Service<Db, Out>>:
        Task<Perform<()>, Ok = (), Err: Error> + Send + Sync + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<SendReturnReminders<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = SendReturnReminders {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            _ = task.execute(Perform(())).await.map_err(|e| {
                log::error!("`task::SendReturnReminders` failed: {e}");
            });
        }
    }
}

impl<Db, Out> Task<Perform<()>> for SendReturnReminders<Service<Db, Out>>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Vec<ReturnPending<Booking>>, RangeInclusive<DateTime>>>,
            Ok = Vec<ReturnPending<Booking>>,
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
    Service<Db, Out>: Command<
            MarkReturnDue,
            Ok = Booking,
            Err = Traced<command::mark_return_due::ExecutionError>,
        >,
{
    type Ok = ();
    type Err = Traced<ExecutionError>;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        if !self.config.enabled {
            return Ok(());
        }

        let now = DateTime::now();
        // Yesterday's lower bound catches the due dates already passed
        // today; earlier ones were handled by the previous sweeps.
        let pending = self
            .service
            .database()
            .execute(Select(By::<Vec<ReturnPending<Booking>>, _>::new(
                (now - DAY)..=(now + 2 * DAY),
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> ExecutionError))?;

        let total = pending.len();
        let mut reminded = 0_usize;
        for ReturnPending(found) in pending {
            match self.remind(&found, now).await {
                Ok(true) => reminded += 1,
                Ok(false) => {}
                // Sweep continues past a failed booking.
                Err(e) => log::error!(
                    "failed to remind about `Booking(id: {})`: {e}",
                    found.id,
                ),
            }
        }
        log::info!(
            "reminder sweep finished: {reminded} of {total} pending returns \
             reminded",
        );
        Ok(())
    }
}

impl<Db, Out> SendReturnReminders<Service<Db, Out>>
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
    Service<Db, Out>: Command<
            MarkReturnDue,
            Ok = Booking,
            Err = Traced<command::mark_return_due::ExecutionError>,
        >,
{
    /// Reminds the customer of the provided [`Booking`]'s approaching
    /// return, reporting whether anything was sent.
    async fn remind(
        &self,
        found: &Booking,
        now: DateTime,
    ) -> Result<bool, Traced<ExecutionError>> {
        if found.reminders_stopped() {
            return Ok(false);
        }

        // A delivered booking whose window ends today (or just ended)
        // receives its return link instead of a plain reminder.
        let due = now.whole_days_until(found.rental_ends_at).unwrap_or(0) == 0;
        if found.delivery_status() == DeliveryStatus::Delivered && due {
            return self
                .service
                .execute(MarkReturnDue {
                    booking_id: found.id,
                })
                .await
                .map(|_| true)
                .map_err(tracerr::map_from_and_wrap!(=> ExecutionError));
        }

        let tx = self
            .service
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> ExecutionError))?;
        tx.execute(Lock(By::<Booking, _>::new(found.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> ExecutionError))
            .map(drop)?;

        let Some(mut booking) = tx
            .execute(Select(By::<Option<Booking>, _>::new(found.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> ExecutionError))?
        else {
            return Ok(false);
        };
        if booking.reminders_stopped() {
            return Ok(false);
        }
        booking.record_reminder_sent();

        tx.execute(Insert(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> ExecutionError))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> ExecutionError))
            .map(drop)?;

        self.service
            .dispatch(
                &booking,
                vec![SideEffect::NotifyCustomer(Template::ReturnReminder)],
            )
            .await;

        Ok(true)
    }
}

/// Error of [`SendReturnReminders`] execution.
#[derive(Debug, Display, From, StdError)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`MarkReturnDue`] [`Command`] failed.
    #[display("cannot mark a return as due: {_0}")]
    #[from]
    MarkReturnDue(command::mark_return_due::ExecutionError),
}

#[cfg(test)]
mod spec {
    use common::operations::Perform;

    use crate::{
        command::tests::{reload, seed_booking, service, store, Recorder},
        domain::{
            booking::{history::Actor, DeliveryStatus, PaymentStatus, Template},
            Booking,
        },
        infra::InMemory,
        task::Task as _,
        Service,
    };

    use super::{Config, SendReturnReminders};

    /// Seeds a paid, delivered booking ending the provided number of days
    /// ago.
    async fn seed_delivered(
        svc: &Service<InMemory, Recorder>,
        ends_days_ago: u32,
    ) -> Booking {
        let mut booking = seed_booking(svc, ends_days_ago).await;
        _ = booking.record_payment(
            PaymentStatus::Paid,
            Actor::PaymentProcessor,
            "charge confirmed",
        );
        for to in [
            DeliveryStatus::AcceptedByLender,
            DeliveryStatus::PreparingShipment,
            DeliveryStatus::ShippedToCustomer,
            DeliveryStatus::Delivered,
        ] {
            _ = booking.transition(to, Actor::Scheduler, "test walk").unwrap();
        }
        store(svc, booking.clone()).await;
        booking
    }

    fn task(
        svc: &Service<InMemory, Recorder>,
    ) -> SendReturnReminders<Service<InMemory, Recorder>> {
        SendReturnReminders {
            config: Config::default(),
            service: svc.clone(),
        }
    }

    #[tokio::test]
    async fn delivered_booking_due_today_gets_its_return_link() {
        let svc = service();
        let seeded = seed_delivered(&svc, 0).await;

        task(&svc).execute(Perform(())).await.unwrap();

        let booking = reload(&svc, seeded.id).await;
        assert_eq!(booking.delivery_status(), DeliveryStatus::ReturnLinkSent);
        assert!(booking.return_flow().token.is_some());
        assert_eq!(booking.return_flow().reminder_count, 1);
        assert!(svc
            .outbound()
            .notifications
            .lock()
            .unwrap()
            .iter()
            .any(|n| n.template == Template::ReturnLink));
    }

    #[tokio::test]
    async fn link_sent_booking_gets_a_plain_reminder() {
        let svc = service();
        let mut seeded = seed_delivered(&svc, 0).await;
        _ = seeded
            .transition(
                DeliveryStatus::ReturnDue,
                Actor::Scheduler,
                "rental window ended",
            )
            .unwrap();
        _ = seeded.mint_return_token();
        _ = seeded
            .transition(
                DeliveryStatus::ReturnLinkSent,
                Actor::Scheduler,
                "return link sent",
            )
            .unwrap();
        seeded.record_reminder_sent();
        store(&svc, seeded.clone()).await;

        task(&svc).execute(Perform(())).await.unwrap();

        let booking = reload(&svc, seeded.id).await;
        assert_eq!(booking.return_flow().reminder_count, 2);
        assert!(svc
            .outbound()
            .notifications
            .lock()
            .unwrap()
            .iter()
            .any(|n| n.template == Template::ReturnReminder));
    }

    #[tokio::test]
    async fn disabled_sweep_sends_nothing() {
        let svc = service();
        _ = seed_delivered(&svc, 0).await;
        let task = SendReturnReminders {
            config: Config {
                enabled: false,
                ..Config::default()
            },
            service: svc.clone(),
        };

        task.execute(Perform(())).await.unwrap();

        assert!(svc.outbound().notifications.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_predicate_suppresses_reminders() {
        let svc = service();
        let mut seeded = seed_delivered(&svc, 0).await;
        _ = seeded
            .transition(
                DeliveryStatus::ReturnDue,
                Actor::Scheduler,
                "rental window ended",
            )
            .unwrap();
        _ = seeded.mint_return_token();
        _ = seeded
            .transition(
                DeliveryStatus::ReturnLinkSent,
                Actor::Scheduler,
                "return link sent",
            )
            .unwrap();
        _ = seeded
            .submit_return(
                crate::domain::booking::return_flow::Method::LocalDropOff,
                None,
            )
            .unwrap();
        store(&svc, seeded.clone()).await;

        task(&svc).execute(Perform(())).await.unwrap();

        let booking = reload(&svc, seeded.id).await;
        assert_eq!(booking.return_flow().reminder_count, 0);
    }
}
