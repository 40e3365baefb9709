//! Catalog [`Item`] definitions.
//!
//! The catalog itself is an external collaborator; only the parts needed
//! for lender eligibility checks are modelled here.

use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user;

/// Rentable catalog item.
#[derive(Clone, Debug)]
pub struct Item {
    /// ID of this [`Item`].
    pub id: Id,

    /// IDs of the lenders offering this [`Item`].
    pub lender_ids: Vec<user::Id>,
}

impl Item {
    /// Indicates whether the provided lender offers this [`Item`].
    #[must_use]
    pub fn is_offered_by(&self, lender_id: user::Id) -> bool {
        self.lender_ids.contains(&lender_id)
    }
}

/// ID of an [`Item`].
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
