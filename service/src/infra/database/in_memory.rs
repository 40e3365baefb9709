//! In-memory [`Database`] implementation.

use std::{collections::HashMap, ops::RangeInclusive, sync::Arc};

use common::{
    operations::{By, Commit, Insert, Lock, Select, Transact},
    DateTime,
};
use tokio::sync::RwLock;
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, return_flow, DeliveryStatus},
        chat, item, lender, payment, Booking, Item, Listing, Payment,
    },
    read::booking::{ReturnPending, Unreturned},
};

use super::{Database, Error};

/// Stored entities of an [`InMemory`] database.
#[derive(Debug, Default)]
struct State {
    /// Stored [`Booking`]s.
    bookings: HashMap<booking::Id, booking::Record>,

    /// Stored [`Payment`]s.
    payments: HashMap<payment::Id, Payment>,

    /// Stored [`chat::Room`]s.
    chat_rooms: HashMap<chat::Id, chat::Room>,

    /// Stored [`Item`]s.
    items: HashMap<item::Id, Item>,

    /// Stored [`Listing`]s.
    listings: HashMap<lender::Id, Listing>,
}

/// In-memory [`Database`].
///
/// Single shared state behind an [`RwLock`]; transactions work directly
/// against it (no rollback), and [`Lock`]s are no-ops, since tests drive
/// commands sequentially.
#[derive(Clone, Debug, Default)]
pub struct InMemory {
    /// Shared [`State`] of this [`InMemory`] database.
    state: Arc<RwLock<State>>,
}

impl InMemory {
    /// Creates a new empty [`InMemory`] database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl InMemory {
    /// Number of [`chat::Room`]s stored for the provided [`Booking`].
    pub(crate) async fn chat_room_count(
        &self,
        booking_id: booking::Id,
    ) -> usize {
        self.state
            .read()
            .await
            .chat_rooms
            .values()
            .filter(|r| r.booking_id == booking_id)
            .count()
    }
}

impl Database<Transact> for InMemory {
    type Ok = Self;
    type Err = Traced<Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for InMemory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl Database<Lock<By<Booking, booking::Id>>> for InMemory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        _: Lock<By<Booking, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl Database<Insert<Booking>> for InMemory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Insert(booking): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        let record = booking::Record::from(booking);
        drop(self.state.write().await.bookings.insert(record.id, record));
        Ok(())
    }
}

impl Database<Select<By<Option<Booking>, booking::Id>>> for InMemory {
    type Ok = Option<Booking>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self
            .state
            .read()
            .await
            .bookings
            .get(&by.into_inner())
            .cloned()
            .map(Booking::from))
    }
}

impl Database<Select<By<Option<Booking>, return_flow::Token>>> for InMemory {
    type Ok = Option<Booking>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, return_flow::Token>>,
    ) -> Result<Self::Ok, Self::Err> {
        let token = by.into_inner();
        Ok(self
            .state
            .read()
            .await
            .bookings
            .values()
            .find(|r| r.return_flow.token.as_ref() == Some(&token))
            .cloned()
            .map(Booking::from))
    }
}

impl Database<Select<By<Vec<Unreturned<Booking>>, DateTime>>> for InMemory {
    type Ok = Vec<Unreturned<Booking>>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Unreturned<Booking>>, DateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let now = by.into_inner();
        Ok(self
            .state
            .read()
            .await
            .bookings
            .values()
            .filter(|r| {
                r.delivery_status.is_awaiting_return()
                    && r.rental_ends_at < now.coerce()
            })
            .cloned()
            .map(|r| Unreturned(Booking::from(r)))
            .collect())
    }
}

impl Database<Select<By<Vec<ReturnPending<Booking>>, RangeInclusive<DateTime>>>>
    for InMemory
{
    type Ok = Vec<ReturnPending<Booking>>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Vec<ReturnPending<Booking>>, RangeInclusive<DateTime>>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let range = by.into_inner();
        Ok(self
            .state
            .read()
            .await
            .bookings
            .values()
            .filter(|r| {
                matches!(
                    r.delivery_status,
                    DeliveryStatus::Delivered
                        | DeliveryStatus::ReturnDue
                        | DeliveryStatus::ReturnLinkSent,
                ) && range.contains(&r.rental_ends_at.coerce())
            })
            .cloned()
            .map(|r| ReturnPending(Booking::from(r)))
            .collect())
    }
}

impl Database<Insert<Payment>> for InMemory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        drop(self.state.write().await.payments.insert(payment.id, payment));
        Ok(())
    }
}

impl Database<Select<By<Option<Payment>, payment::Id>>> for InMemory {
    type Ok = Option<Payment>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.state.read().await.payments.get(&by.into_inner()).cloned())
    }
}

impl Database<Select<By<Option<Payment>, payment::IntentId>>> for InMemory {
    type Ok = Option<Payment>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::IntentId>>,
    ) -> Result<Self::Ok, Self::Err> {
        let intent_id = by.into_inner();
        Ok(self
            .state
            .read()
            .await
            .payments
            .values()
            .find(|p| p.intent_id.as_ref() == Some(&intent_id))
            .cloned())
    }
}

impl Database<Insert<chat::Room>> for InMemory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Insert(room): Insert<chat::Room>,
    ) -> Result<Self::Ok, Self::Err> {
        drop(self.state.write().await.chat_rooms.insert(room.id, room));
        Ok(())
    }
}

impl Database<Select<By<Option<chat::Room>, booking::Id>>> for InMemory {
    type Ok = Option<chat::Room>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<chat::Room>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let booking_id = by.into_inner();
        Ok(self
            .state
            .read()
            .await
            .chat_rooms
            .values()
            .find(|r| r.booking_id == booking_id)
            .copied())
    }
}

impl Database<Insert<Item>> for InMemory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Insert(item): Insert<Item>,
    ) -> Result<Self::Ok, Self::Err> {
        drop(self.state.write().await.items.insert(item.id, item));
        Ok(())
    }
}

impl Database<Select<By<Option<Item>, item::Id>>> for InMemory {
    type Ok = Option<Item>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Item>, item::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.state.read().await.items.get(&by.into_inner()).cloned())
    }
}

impl Database<Insert<Listing>> for InMemory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Insert(listing): Insert<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        drop(self.state.write().await.listings.insert(listing.id, listing));
        Ok(())
    }
}

impl Database<Select<By<Vec<Listing>, item::Id>>> for InMemory {
    type Ok = Vec<Listing>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Listing>, item::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let item_id = by.into_inner();
        let mut listings: Vec<_> = self
            .state
            .read()
            .await
            .listings
            .values()
            .filter(|l| l.item_id == item_id)
            .copied()
            .collect();
        // Stable input ordering for the allocation tie-break.
        listings.sort_by_key(|l| l.id.to_string());
        Ok(listings)
    }
}
