//! Service contains the business logic of the application.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;
pub mod query;
pub mod read;
pub mod task;

use common::operations::{By, Perform, Start};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking::SideEffect, Booking},
    infra::outbound,
};

#[cfg(doc)]
use infra::{Database, Outbound};

pub use self::{command::Command, query::Query, task::Task};

/// [`Service`] configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    /// [`task::EscalateOverdueReturns`] configuration.
    pub escalate_overdue_returns: task::escalate_overdue_returns::Config,

    /// [`task::SendReturnReminders`] configuration.
    pub send_return_reminders: task::send_return_reminders::Config,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db, Out> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`Outbound`] collaborators of this [`Service`].
    outbound: Out,
}

impl<Db, Out> Service<Db, Out> {
    /// Creates a new [`Service`] with the provided parameters.
    pub fn new(
        config: Config,
        database: Db,
        outbound: Out,
    ) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::EscalateOverdueReturns<Self>,
                        task::escalate_overdue_returns::Config,
                    >,
                >,
                Ok = (),
                Err: std::error::Error,
            > + Task<
                Start<
                    By<
                        task::SendReturnReminders<Self>,
                        task::send_return_reminders::Config,
                    >,
                >,
                Ok = (),
                Err: std::error::Error,
            > + Clone
            + 'static,
    {
        let this = Service {
            config,
            database,
            outbound,
        };

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn(async move {
            svc.execute(Start(By::new(
                svc.config().escalate_overdue_returns,
            )))
            .await
        });
        let svc = this.clone();
        bg.spawn(async move {
            svc.execute(Start(By::new(svc.config().send_return_reminders)))
                .await
        });

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns [`Outbound`] collaborators of this [`Service`].
    #[must_use]
    pub fn outbound(&self) -> &Out {
        &self.outbound
    }
}

impl<Db, Out> Service<Db, Out>
where
    Out: infra::Outbound<
            Perform<outbound::Notify>,
            Ok = (),
            Err = Traced<outbound::Error>,
        >,
{
    /// Dispatches the provided [`SideEffect`]s of the [`Booking`].
    ///
    /// Must be called after the producing change is committed only.
    /// Delivery failures are logged and never propagated: a lost
    /// notification never rolls a persisted change back.
    pub(crate) async fn dispatch(
        &self,
        booking: &Booking,
        effects: Vec<SideEffect>,
    ) {
        for effect in effects {
            let (recipient, template) = match effect {
                SideEffect::NotifyCustomer(t) => (booking.customer_id, t),
                SideEffect::NotifyLender(t) => (booking.lender.lender_id, t),
            };
            _ = self
                .outbound
                .execute(Perform(outbound::Notify {
                    recipient,
                    template,
                    booking_id: booking.id,
                }))
                .await
                .map_err(|e| {
                    log::warn!(
                        "failed to notify `User(id: {recipient})` about \
                         `Booking(id: {})`: {e}",
                        booking.id,
                    );
                });
        }
    }
}
