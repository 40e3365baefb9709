//! Refund [`Record`]s and the append-only [`Ledger`] of a booking.

use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};

use crate::domain::booking::history::Actor;

/// Single refund applied (or requested) against a booking.
///
/// Immutable once created, except for its processor-assigned [`Status`]
/// which is finalized by the `refund` webhook event.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Record {
    /// Processor-assigned ID of this refund.
    pub id: Id,

    /// Refunded amount.
    pub amount: Money,

    /// Reason of this refund, if any.
    pub reason: Option<String>,

    /// [`Kind`] of this refund.
    pub kind: Kind,

    /// Processor-assigned [`Status`] of this refund.
    pub status: Status,

    /// [`Actor`] who approved this refund.
    pub actor: Actor,

    /// [`DateTime`] when this [`Record`] was created.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: CreationDateTime,
}

/// Processor-assigned ID of a refund.
#[derive(
    AsRef,
    Clone,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(String);

define_kind! {
    #[doc = "Kind of a refund."]
    enum Kind {
        #[doc = "Refund of the whole booking total."]
        Full = 1,

        #[doc = "Refund of a part of the booking total."]
        Partial = 2,
    }
}

define_kind! {
    #[doc = "Processor-assigned status of a refund."]
    enum Status {
        #[doc = "Refund requested, not confirmed by the processor yet."]
        Pending = 1,

        #[doc = "Refund confirmed by the processor."]
        Succeeded = 2,

        #[doc = "Refund rejected by the processor."]
        Failed = 3,
    }
}

/// Append-only ledger of refund [`Record`]s of a booking.
///
/// [`Record`]s are never removed or reordered; the cumulative refunded
/// amount is validated against the booking total by the booking itself.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Ledger(Vec<Record>);

impl Ledger {
    /// Creates a new empty [`Ledger`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the [`Record`] with the provided [`Id`], if any.
    #[must_use]
    pub fn get(&self, id: &Id) -> Option<&Record> {
        self.0.iter().find(|r| &r.id == id)
    }

    /// Indicates whether this [`Ledger`] contains a [`Record`] with the
    /// provided [`Id`].
    #[must_use]
    pub fn contains(&self, id: &Id) -> bool {
        self.get(id).is_some()
    }

    /// Returns the cumulative refunded amount of this [`Ledger`].
    ///
    /// [`Status::Failed`] [`Record`]s don't count. [`None`] is returned in
    /// case no [`Record`]s count or the counted ones disagree on currency.
    #[must_use]
    pub fn total(&self) -> Option<Money> {
        self.0
            .iter()
            .filter(|r| r.status != Status::Failed)
            .map(|r| r.amount)
            .try_fold(None, |acc: Option<Money>, amount| match acc {
                None => Ok(Some(amount)),
                Some(sum) => sum.checked_add(amount).map(Some).ok_or(()),
            })
            .ok()
            .flatten()
    }

    /// Returns the number of [`Record`]s in this [`Ledger`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Indicates whether this [`Ledger`] is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the [`Record`]s of this [`Ledger`] in append order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.0.iter()
    }

    /// Appends the provided [`Record`] to this [`Ledger`].
    ///
    /// Amount validation is performed by the owning booking.
    pub(crate) fn push(&mut self, record: Record) {
        self.0.push(record);
    }

    /// Finalizes the [`Status`] of the [`Record`] with the provided [`Id`].
    pub(crate) fn finalize(&mut self, id: &Id, status: Status) {
        if let Some(record) = self.0.iter_mut().find(|r| &r.id == id) {
            record.status = status;
        }
    }
}

/// Result of applying a processor refund confirmation to a booking.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Application {
    /// Refund was applied to the booking.
    Applied,

    /// Refund had been applied before, nothing changed.
    AlreadyApplied,
}

/// [`DateTime`] when a refund [`Record`] was created.
///
/// [`DateTime`]: common::DateTime
pub type CreationDateTime = DateTimeOf<(Record, unit::Creation)>;
