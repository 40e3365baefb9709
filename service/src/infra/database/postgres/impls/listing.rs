//! [`Listing`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Select},
    Money,
};
use postgres_types::Json;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{item, lender::GeoPoint, Listing},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Columns of the `listings` table, in hydration order.
const COLUMNS: &str = "\
    id, lender_id, item_id, \
    price_four_days, price_eight_days, currency, \
    is_active, is_approved, pickup_point";

/// Hydrates a [`Listing`] from the provided [`COLUMNS`] row.
fn hydrate(row: &Row) -> Listing {
    let currency = row.get("currency");
    Listing {
        id: row.get("id"),
        lender_id: row.get("lender_id"),
        item_id: row.get("item_id"),
        price_four_days: Money {
            amount: row.get("price_four_days"),
            currency,
        },
        price_eight_days: Money {
            amount: row.get("price_eight_days"),
            currency,
        },
        is_active: row.get("is_active"),
        is_approved: row.get("is_approved"),
        pickup_point: row
            .get::<_, Option<Json<GeoPoint>>>("pickup_point")
            .map(|p| p.0),
    }
}

impl<C> Database<Insert<Listing>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(listing): Insert<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        let Listing {
            id,
            lender_id,
            item_id,
            price_four_days,
            price_eight_days,
            is_active,
            is_approved,
            pickup_point,
        } = listing;

        // Both tier prices share the listing's currency.
        let currency = price_four_days.currency;
        let pickup_point = pickup_point.map(Json);

        const SQL: &str = "\
            INSERT INTO listings (\
                id, lender_id, item_id, \
                price_four_days, price_eight_days, currency, \
                is_active, is_approved, pickup_point \
            ) VALUES (\
                $1::UUID, $2::UUID, $3::UUID, \
                $4::NUMERIC, $5::NUMERIC, $6::INT2, \
                $7::BOOL, $8::BOOL, $9::JSONB \
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET lender_id = EXCLUDED.lender_id, \
                item_id = EXCLUDED.item_id, \
                price_four_days = EXCLUDED.price_four_days, \
                price_eight_days = EXCLUDED.price_eight_days, \
                currency = EXCLUDED.currency, \
                is_active = EXCLUDED.is_active, \
                is_approved = EXCLUDED.is_approved, \
                pickup_point = EXCLUDED.pickup_point";
        self.exec(
            SQL,
            &[
                &id,
                &lender_id,
                &item_id,
                &price_four_days.amount,
                &price_eight_days.amount,
                &currency,
                &is_active,
                &is_approved,
                &pickup_point,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<Vec<Listing>, item::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Listing>, item::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let item_id: item::Id = by.into_inner();

        // Stable input ordering for the allocation tie-break.
        let sql = format!(
            "SELECT {COLUMNS} \
             FROM listings \
             WHERE item_id = $1::UUID \
             ORDER BY id",
        );
        Ok(self
            .query(&sql, &[&item_id])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(hydrate)
            .collect())
    }
}
