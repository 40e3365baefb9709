//! Lender allocation engine.
//!
//! Pure selection of a lender for a booking request: the caller persists
//! the produced [`AllocatedLender`] into the booking.

use common::{define_kind, DateTime};
use derive_more::{Display, Error as StdError};

use crate::domain::{
    item::Item,
    lender::{AllocatedLender, GeoPoint, Kind, Listing},
    user,
};

/// Requested delivery method of a booking.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Method {
    /// Customer picks the item up from the chosen lender.
    Pickup {
        /// ID of the lender chosen by the customer.
        lender_id: user::Id,

        /// Pickup point of the chosen lender.
        point: GeoPoint,
    },

    /// Item is shipped to the customer by the cheapest eligible lender.
    Shipping,
}

define_kind! {
    #[doc = "Pricing tier of a rental duration."]
    enum DurationTier {
        #[doc = "Rental of up to 4 days."]
        FourDays = 1,

        #[doc = "Rental of up to 8 days."]
        EightDays = 2,
    }
}

impl DurationTier {
    /// Returns the [`DurationTier`] covering the provided number of rental
    /// days.
    #[must_use]
    pub fn covering(days: u64) -> Self {
        if days <= 4 {
            Self::FourDays
        } else {
            Self::EightDays
        }
    }
}

/// Picks a lender among the provided [`Listing`]s of the [`Item`].
///
/// For [`Method::Pickup`] the chosen lender must both appear in the
/// [`Item`]'s lender set and hold an eligible [`Listing`]. For
/// [`Method::Shipping`] the eligible [`Listing`] with the minimum price for
/// the provided [`DurationTier`] wins, ties broken by the first-encountered
/// order.
///
/// # Errors
///
/// - [`Error::LenderNotEligible`] in case the chosen pickup lender is not
///   eligible.
/// - [`Error::NoEligibleLender`] in case no [`Listing`] remains after
///   filtering.
pub fn allocate(
    method: Method,
    item: &Item,
    listings: &[Listing],
    tier: DurationTier,
) -> Result<AllocatedLender, Error> {
    match method {
        Method::Pickup { lender_id, point } => {
            let listing = listings
                .iter()
                .find(|l| l.lender_id == lender_id && l.is_eligible())
                .filter(|_| item.is_offered_by(lender_id))
                .ok_or(Error::LenderNotEligible(lender_id))?;

            Ok(AllocatedLender {
                lender_id,
                price: listing.price(tier),
                kind: Kind::LocalPickup,
                point: Some(point),
                allocated_at: DateTime::now().coerce(),
            })
        }
        Method::Shipping => listings
            .iter()
            .filter(|l| l.is_eligible())
            .min_by_key(|l| l.price(tier).amount)
            .map(|l| AllocatedLender {
                lender_id: l.lender_id,
                price: l.price(tier),
                kind: Kind::Shipping,
                point: None,
                allocated_at: DateTime::now().coerce(),
            })
            .ok_or(Error::NoEligibleLender),
    }
}

/// Error of a lender allocation.
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {
    /// Chosen lender is not eligible for the requested item.
    #[display("`User(id: {_0})` is not an eligible lender")]
    LenderNotEligible(#[error(not(source))] user::Id),

    /// No eligible lender remains after filtering.
    #[display("no eligible lender for the requested item")]
    NoEligibleLender,
}

#[cfg(test)]
mod spec {
    use common::{money::Currency, Money};
    use rust_decimal::Decimal;

    use crate::domain::{
        item::{self, Item},
        lender::{self, GeoPoint, Kind, Listing},
        user,
    };

    use super::{allocate, DurationTier, Error, Method};

    fn usd(amount: i64) -> Money {
        Money {
            amount: Decimal::new(amount, 0),
            currency: Currency::Usd,
        }
    }

    fn listing(lender_id: user::Id, item_id: item::Id, four: i64) -> Listing {
        Listing {
            id: lender::Id::new(),
            lender_id,
            item_id,
            price_four_days: usd(four),
            price_eight_days: usd(four * 2),
            is_active: true,
            is_approved: true,
            pickup_point: Some(GeoPoint { lat: 0.0, lon: 0.0 }),
        }
    }

    #[test]
    fn shipping_picks_minimum_price() {
        let item_id = item::Id::new();
        let (a, b, c) = (user::Id::new(), user::Id::new(), user::Id::new());
        let item = Item {
            id: item_id,
            lender_ids: vec![a, b, c],
        };
        let listings = [
            listing(a, item_id, 50),
            listing(b, item_id, 30),
            listing(c, item_id, 40),
        ];

        let allocated =
            allocate(Method::Shipping, &item, &listings, DurationTier::FourDays)
                .unwrap();

        assert_eq!(allocated.lender_id, b);
        assert_eq!(allocated.price, usd(30));
        assert_eq!(allocated.kind, Kind::Shipping);
    }

    #[test]
    fn shipping_breaks_ties_by_first_encountered() {
        let item_id = item::Id::new();
        let (a, b) = (user::Id::new(), user::Id::new());
        let item = Item {
            id: item_id,
            lender_ids: vec![a, b],
        };
        let listings = [listing(a, item_id, 30), listing(b, item_id, 30)];

        let allocated =
            allocate(Method::Shipping, &item, &listings, DurationTier::FourDays)
                .unwrap();

        assert_eq!(allocated.lender_id, a);
    }

    #[test]
    fn shipping_uses_requested_duration_tier() {
        let item_id = item::Id::new();
        let (a, b) = (user::Id::new(), user::Id::new());
        let item = Item {
            id: item_id,
            lender_ids: vec![a, b],
        };
        // Cheaper for 4 days, pricier for 8 days.
        let mut first = listing(a, item_id, 30);
        first.price_eight_days = usd(100);
        let listings = [first, listing(b, item_id, 35)];

        let allocated = allocate(
            Method::Shipping,
            &item,
            &listings,
            DurationTier::EightDays,
        )
        .unwrap();

        assert_eq!(allocated.lender_id, b);
        assert_eq!(allocated.price, usd(70));
    }

    #[test]
    fn shipping_fails_without_eligible_listings() {
        let item_id = item::Id::new();
        let a = user::Id::new();
        let item = Item {
            id: item_id,
            lender_ids: vec![a],
        };
        let mut only = listing(a, item_id, 30);
        only.is_approved = false;

        let result =
            allocate(Method::Shipping, &item, &[only], DurationTier::FourDays);

        assert!(matches!(result, Err(Error::NoEligibleLender)));
    }

    #[test]
    fn pickup_requires_item_offer_and_eligible_listing() {
        let item_id = item::Id::new();
        let (a, stranger) = (user::Id::new(), user::Id::new());
        let item = Item {
            id: item_id,
            lender_ids: vec![a],
        };
        let point = GeoPoint { lat: 1.0, lon: 2.0 };
        let listings = [listing(a, item_id, 30), listing(stranger, item_id, 10)];

        let allocated = allocate(
            Method::Pickup {
                lender_id: a,
                point,
            },
            &item,
            &listings,
            DurationTier::FourDays,
        )
        .unwrap();
        assert_eq!(allocated.lender_id, a);
        assert_eq!(allocated.kind, Kind::LocalPickup);
        assert_eq!(allocated.point, Some(point));

        // Not in the item's lender set.
        let result = allocate(
            Method::Pickup {
                lender_id: stranger,
                point,
            },
            &item,
            &listings,
            DurationTier::FourDays,
        );
        assert!(matches!(result, Err(Error::LenderNotEligible(id)) if id == stranger));
    }

    #[test]
    fn duration_tier_covering() {
        assert_eq!(DurationTier::covering(3), DurationTier::FourDays);
        assert_eq!(DurationTier::covering(4), DurationTier::FourDays);
        assert_eq!(DurationTier::covering(5), DurationTier::EightDays);
    }
}
