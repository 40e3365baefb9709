//! Lender-side definitions: [`Listing`]s and the [`AllocatedLender`]
//! embedded into a booking.

use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::Booking;
use crate::domain::{allocation::DurationTier, item, user};

/// Lender's offer of a catalog [`item::Item`] for rent.
#[derive(Clone, Copy, Debug)]
pub struct Listing {
    /// ID of this [`Listing`].
    pub id: Id,

    /// ID of the lender owning this [`Listing`].
    pub lender_id: user::Id,

    /// ID of the offered [`item::Item`].
    pub item_id: item::Id,

    /// Price for a 4-day rental.
    pub price_four_days: Money,

    /// Price for an 8-day rental.
    pub price_eight_days: Money,

    /// Whether this [`Listing`] is active.
    pub is_active: bool,

    /// Whether this [`Listing`] is approved by moderation.
    pub is_approved: bool,

    /// Local pickup point, if the lender offers pickup.
    pub pickup_point: Option<GeoPoint>,
}

impl Listing {
    /// Indicates whether this [`Listing`] may be allocated to a booking.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.is_active && self.is_approved
    }

    /// Returns the price of this [`Listing`] for the provided
    /// [`DurationTier`].
    #[must_use]
    pub fn price(&self, tier: DurationTier) -> Money {
        match tier {
            DurationTier::FourDays => self.price_four_days,
            DurationTier::EightDays => self.price_eight_days,
        }
    }
}

/// ID of a [`Listing`].
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

/// Lender allocated to a [`Booking`].
///
/// Created once at [`Booking`] creation and never reassigned.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct AllocatedLender {
    /// ID of the allocated lender.
    pub lender_id: user::Id,

    /// Price quoted by the lender at allocation time.
    pub price: Money,

    /// [`Kind`] of this allocation.
    pub kind: Kind,

    /// Pickup point, in case of a [`Kind::LocalPickup`] allocation.
    pub point: Option<GeoPoint>,

    /// [`DateTime`] when the allocation happened.
    ///
    /// [`DateTime`]: common::DateTime
    pub allocated_at: AllocationDateTime,
}

define_kind! {
    #[doc = "Kind of an [`AllocatedLender`] allocation."]
    enum Kind {
        #[doc = "Customer picks the item up from the lender."]
        LocalPickup = 1,

        #[doc = "Lender ships the item to the customer."]
        Shipping = 2,
    }
}

/// Geographic point of a pickup location.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct GeoPoint {
    /// Latitude of this [`GeoPoint`].
    pub lat: f64,

    /// Longitude of this [`GeoPoint`].
    pub lon: f64,
}

/// [`DateTime`] when an [`AllocatedLender`] was allocated.
///
/// [`DateTime`]: common::DateTime
pub type AllocationDateTime = DateTimeOf<(AllocatedLender, unit::Allocation)>;
