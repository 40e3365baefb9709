//! [`Payment`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Select},
    Money,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{payment, Payment},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Columns of the `payments` table, in hydration order.
const COLUMNS: &str = "\
    id, booking_id, kind, intent_id, \
    amount, currency, status, created_at";

/// Hydrates a [`Payment`] from the provided [`COLUMNS`] row.
fn hydrate(row: &Row) -> Payment {
    Payment {
        id: row.get("id"),
        booking_id: row.get("booking_id"),
        kind: row.get("kind"),
        intent_id: row.get("intent_id"),
        amount: Money {
            amount: row.get("amount"),
            currency: row.get("currency"),
        },
        status: row.get("status"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Insert<Payment>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        let Payment {
            id,
            booking_id,
            kind,
            intent_id,
            amount,
            status,
            created_at,
        } = payment;

        const SQL: &str = "\
            INSERT INTO payments (\
                id, booking_id, kind, intent_id, \
                amount, currency, status, created_at \
            ) VALUES (\
                $1::UUID, $2::UUID, $3::INT2, $4::VARCHAR, \
                $5::NUMERIC, $6::INT2, $7::INT2, $8::TIMESTAMPTZ \
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET booking_id = EXCLUDED.booking_id, \
                intent_id = EXCLUDED.intent_id, \
                amount = EXCLUDED.amount, \
                currency = EXCLUDED.currency, \
                status = EXCLUDED.status";
        self.exec(
            SQL,
            &[
                &id,
                &booking_id,
                &kind,
                &intent_id,
                &amount.amount,
                &amount.currency,
                &status,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<Option<Payment>, payment::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: payment::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM payments \
             WHERE id = $1::UUID \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(hydrate))
    }
}

impl<C> Database<Select<By<Option<Payment>, payment::IntentId>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::IntentId>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let intent_id: payment::IntentId = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM payments \
             WHERE intent_id = $1::VARCHAR \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&intent_id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(hydrate))
    }
}
