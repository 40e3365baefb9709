//! [`EscalateOverdueReturns`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::{
    operations::{
        By, Commit, Insert, Lock, Perform, Select, Start, Transact,
        Transacted,
    },
    DateTime, Percent,
};
use rust_decimal::Decimal;
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking, Booking},
    infra::{database, outbound, Database, Outbound},
    read::booking::Unreturned,
    Service,
};

use super::Task;

/// Configuration for [`EscalateOverdueReturns`] [`Task`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Interval between overdue sweeps.
    pub interval: time::Duration,

    /// Late fee suggested per day a return is overdue, as a percentage of
    /// the booking total.
    pub late_fee_percent_per_day: Percent,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: time::Duration::from_secs(24 * 60 * 60),
            late_fee_percent_per_day: Percent::new(Decimal::new(5, 0))
                .expect("5 is a valid percent"),
        }
    }
}

/// [`Task`] for escalating overdue returns of [`Booking`]s.
///
/// Sweeps all the unreturned [`Booking`]s past their rental window,
/// re-deriving the escalation tier from the days overdue. Tiers only ever
/// increase: a re-run on the same day is a no-op.
#[derive(Clone, Copy, Debug)]
pub struct EscalateOverdueReturns<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db, Out> Task<Start<By<EscalateOverdueReturns<Self>, Config>>>
    for Service<Db, Out>
where
    EscalateOverdueReturns<Service<Db, Out>>:
        Task<Perform<()>, Ok = (), Err: Error> + Send + Sync + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<EscalateOverdueReturns<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = EscalateOverdueReturns {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            _ = task.execute(Perform(())).await.map_err(|e| {
                log::error!("`task::EscalateOverdueReturns` failed: {e}");
            });
        }
    }
}

impl<Db, Out> Task<Perform<()>> for EscalateOverdueReturns<Service<Db, Out>>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Vec<Unreturned<Booking>>, DateTime>>,
            Ok = Vec<Unreturned<Booking>>,
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
    type Ok = ();
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let now = DateTime::now();
        let unreturned = self
            .service
            .database()
            .execute(Select(By::<Vec<Unreturned<Booking>>, _>::new(now)))
            .await
            .map_err(tracerr::wrap!())?;

        let total = unreturned.len();
        let mut escalated = 0_usize;
        for Unreturned(found) in unreturned {
            match self.escalate(found.id, now).await {
                Ok(true) => escalated += 1,
                Ok(false) => {}
                // Sweep continues past a failed booking.
                Err(e) => log::error!(
                    "failed to escalate `Booking(id: {})`: {e}",
                    found.id,
                ),
            }
        }
        log::info!(
            "overdue sweep finished: {escalated} of {total} unreturned \
             bookings escalated",
        );
        Ok(())
    }
}

impl<Db, Out> EscalateOverdueReturns<Service<Db, Out>>
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
    /// Escalates the provided [`Booking`], reporting whether its tier
    /// increased.
    async fn escalate(
        &self,
        id: booking::Id,
        now: DateTime,
    ) -> Result<bool, ExecutionError> {
        let tx = self
            .service
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::wrap!())?;
        tx.execute(Lock(By::<Booking, _>::new(id)))
            .await
            .map_err(tracerr::wrap!())
            .map(drop)?;

        let Some(mut booking) = tx
            .execute(Select(By::<Option<Booking>, _>::new(id)))
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(false);
        };
        if booking.reminders_stopped() {
            return Ok(false);
        }
        let Some(effects) =
            booking.escalate(now, self.config.late_fee_percent_per_day)
        else {
            return Ok(false);
        };

        tx.execute(Insert(booking.clone()))
            .await
            .map_err(tracerr::wrap!())
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::wrap!())
            .map(drop)?;

        self.service.dispatch(&booking, effects).await;

        Ok(true)
    }
}

/// Error of [`EscalateOverdueReturns`] execution.
pub type ExecutionError = Traced<database::Error>;
