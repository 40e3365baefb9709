//! [`Item`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{item, Item},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Hydrates an [`Item`] from the provided row.
fn hydrate(row: &Row) -> Item {
    Item {
        id: row.get("id"),
        lender_ids: row.get("lender_ids"),
    }
}

impl<C> Database<Insert<Item>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(item): Insert<Item>,
    ) -> Result<Self::Ok, Self::Err> {
        let Item { id, lender_ids } = item;

        const SQL: &str = "\
            INSERT INTO items (id, lender_ids) \
            VALUES ($1::UUID, $2::UUID[]) \
            ON CONFLICT (id) DO UPDATE \
            SET lender_ids = EXCLUDED.lender_ids";
        self.exec(SQL, &[&id, &lender_ids])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Select<By<Option<Item>, item::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Item>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Item>, item::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: item::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, lender_ids \
            FROM items \
            WHERE id = $1::UUID \
            LIMIT 1";
        self.query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(hydrate))
    }
}
