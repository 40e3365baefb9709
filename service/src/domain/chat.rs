//! Chat [`Room`] definitions.
//!
//! A [`Room`] connects the customer and the lender of a booking, and is
//! created exactly once on the first successful checkout completion.

use common::{unit, DateTime, DateTimeOf};
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{booking, user, Booking};

/// Chat room between the customer and the lender of a [`Booking`].
#[derive(Clone, Copy, Debug)]
pub struct Room {
    /// ID of this [`Room`].
    pub id: Id,

    /// ID of the related [`Booking`].
    pub booking_id: booking::Id,

    /// Participants of this [`Room`]: the customer and the lender.
    pub participants: [user::Id; 2],

    /// [`DateTime`] when this [`Room`] was created.
    pub created_at: CreationDateTime,
}

impl Room {
    /// Creates a new [`Room`] for the provided [`Booking`].
    #[must_use]
    pub fn new(booking: &Booking) -> Self {
        Self {
            id: Id::new(),
            booking_id: booking.id,
            participants: [booking.customer_id, booking.lender.lender_id],
            created_at: DateTime::now().coerce(),
        }
    }
}

/// ID of a [`Room`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// [`DateTime`] when a [`Room`] was created.
pub type CreationDateTime = DateTimeOf<(Room, unit::Creation)>;
