//! Append-only status history of a booking.

use common::{define_kind, unit, DateTime, DateTimeOf};
use serde::{Deserialize, Serialize};

use crate::domain::booking::DeliveryStatus;

#[cfg(doc)]
use crate::domain::Booking;

/// Single entry of a [`Booking`]'s status history.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Entry {
    /// [`DeliveryStatus`] the [`Booking`] entered.
    pub status: DeliveryStatus,

    /// [`DateTime`] when the [`Booking`] entered the [`DeliveryStatus`].
    ///
    /// [`DateTime`]: common::DateTime
    pub at: EntryDateTime,

    /// [`Actor`] who caused the change.
    pub actor: Actor,

    /// Human-readable reason of the change.
    pub reason: String,
}

define_kind! {
    #[doc = "Actor causing a booking status change."]
    enum Actor {
        #[doc = "Customer of the booking."]
        Customer = 1,

        #[doc = "Lender of the booking."]
        Lender = 2,

        #[doc = "Administrator."]
        Admin = 3,

        #[doc = "External payment processor (via webhook events)."]
        PaymentProcessor = 4,

        #[doc = "Background scheduler."]
        Scheduler = 5,
    }
}

/// Append-only status history of a [`Booking`].
///
/// Entries are only ever appended, never rewritten or reordered, so the
/// history stays a faithful audit trail of every status the booking went
/// through.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Ledger(Vec<Entry>);

impl Ledger {
    /// Creates a new [`Ledger`] opened with the provided initial
    /// [`DeliveryStatus`].
    #[must_use]
    pub fn opened_with(
        status: DeliveryStatus,
        actor: Actor,
        reason: impl Into<String>,
    ) -> Self {
        let mut this = Self::default();
        this.append(status, actor, reason);
        this
    }

    /// Returns the latest [`Entry`] of this [`Ledger`], if any.
    #[must_use]
    pub fn last(&self) -> Option<&Entry> {
        self.0.last()
    }

    /// Returns the number of [`Entry`]s in this [`Ledger`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Indicates whether this [`Ledger`] is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the [`Entry`]s of this [`Ledger`] in append order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.0.iter()
    }

    /// Appends a new [`Entry`] to this [`Ledger`].
    pub(crate) fn append(
        &mut self,
        status: DeliveryStatus,
        actor: Actor,
        reason: impl Into<String>,
    ) {
        self.0.push(Entry {
            status,
            at: DateTime::now().coerce(),
            actor,
            reason: reason.into(),
        });
    }
}

/// [`DateTime`] when a [`Booking`] entered a [`DeliveryStatus`].
///
/// [`DateTime`]: common::DateTime
pub type EntryDateTime = DateTimeOf<(Entry, unit::Creation)>;
