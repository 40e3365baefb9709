//! [`Booking`]-related [`Database`] implementations.

use std::ops::RangeInclusive;

use common::{
    operations::{By, Insert, Lock, Select},
    DateTime,
};
use postgres_types::Json;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, history, return_flow, DeliveryStatus},
        lender::AllocatedLender,
        refund, Booking,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read::booking::{ReturnPending, Unreturned},
};

/// Statement taking the per-booking lock.
///
/// The conflict path must go through `DO UPDATE`: `DO NOTHING` skips the
/// existing row without locking it, so a second transaction would sail past
/// and the two would upsert over each other's `history`/`refunds`.
const LOCK_SQL: &str = "\
    INSERT INTO bookings_lock \
    VALUES ($1::UUID) \
    ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id";

/// Columns of the `bookings` table, in hydration order.
const COLUMNS: &str = "\
    id, customer_id, item_id, lender, \
    rental_starts_at, rental_ends_at, \
    fees, payment_id, created_at, \
    delivery_status, payment_status, \
    history, refunds, return_flow";

/// Hydrates a [`Booking`] from the provided [`COLUMNS`] row.
fn hydrate(row: &Row) -> Booking {
    Booking::from(booking::Record {
        id: row.get("id"),
        customer_id: row.get("customer_id"),
        item_id: row.get("item_id"),
        lender: row.get::<_, Json<AllocatedLender>>("lender").0,
        rental_starts_at: row.get("rental_starts_at"),
        rental_ends_at: row.get("rental_ends_at"),
        fees: row.get::<_, Json<booking::Fees>>("fees").0,
        payment_id: row.get("payment_id"),
        created_at: row.get("created_at"),
        delivery_status: row.get("delivery_status"),
        payment_status: row.get("payment_status"),
        history: row.get::<_, Json<history::Ledger>>("history").0,
        refunds: row.get::<_, Json<refund::Ledger>>("refunds").0,
        return_flow: row.get::<_, Json<return_flow::State>>("return_flow").0,
    })
}

impl<C> Database<Insert<Booking>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(booking): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        let booking::Record {
            id,
            customer_id,
            item_id,
            lender,
            rental_starts_at,
            rental_ends_at,
            fees,
            payment_id,
            created_at,
            delivery_status,
            payment_status,
            history,
            refunds,
            return_flow,
        } = booking.into();

        // Denormalized alongside the JSONB state for the indexed lookup.
        let return_token = return_flow.token.clone();

        let lender = Json(lender);
        let fees = Json(fees);
        let history = Json(history);
        let refunds = Json(refunds);
        let return_flow = Json(return_flow);

        const SQL: &str = "\
            INSERT INTO bookings (\
                id, customer_id, item_id, lender, \
                rental_starts_at, rental_ends_at, \
                fees, payment_id, created_at, \
                delivery_status, payment_status, \
                history, refunds, return_flow, return_token \
            ) VALUES (\
                $1::UUID, $2::UUID, $3::UUID, $4::JSONB, \
                $5::TIMESTAMPTZ, $6::TIMESTAMPTZ, \
                $7::JSONB, $8::UUID, $9::TIMESTAMPTZ, \
                $10::INT2, $11::INT2, \
                $12::JSONB, $13::JSONB, $14::JSONB, $15::VARCHAR \
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET lender = EXCLUDED.lender, \
                rental_starts_at = EXCLUDED.rental_starts_at, \
                rental_ends_at = EXCLUDED.rental_ends_at, \
                fees = EXCLUDED.fees, \
                payment_id = EXCLUDED.payment_id, \
                delivery_status = EXCLUDED.delivery_status, \
                payment_status = EXCLUDED.payment_status, \
                history = EXCLUDED.history, \
                refunds = EXCLUDED.refunds, \
                return_flow = EXCLUDED.return_flow, \
                return_token = EXCLUDED.return_token";
        self.exec(
            SQL,
            &[
                &id,
                &customer_id,
                &item_id,
                &lender,
                &rental_starts_at,
                &rental_ends_at,
                &fees,
                &payment_id,
                &created_at,
                &delivery_status,
                &payment_status,
                &history,
                &refunds,
                &return_flow,
                &return_token,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<Option<Booking>, booking::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: booking::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE id = $1::UUID \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(hydrate))
    }
}

impl<C> Database<Select<By<Option<Booking>, return_flow::Token>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, return_flow::Token>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let token: return_flow::Token = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE return_token = $1::VARCHAR \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&token])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(hydrate))
    }
}

impl<C> Database<Select<By<Vec<Unreturned<Booking>>, DateTime>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Unreturned<Booking>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Unreturned<Booking>>, DateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let now = by.into_inner();
        let awaiting: &[DeliveryStatus] = &[
            DeliveryStatus::ReturnDue,
            DeliveryStatus::ReturnLinkSent,
            DeliveryStatus::LateReturn,
            DeliveryStatus::Overdue,
            DeliveryStatus::Escalated,
            DeliveryStatus::HighRisk,
            DeliveryStatus::NonReturned,
        ];

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE delivery_status = ANY($1::INT2[]) \
               AND rental_ends_at < $2::TIMESTAMPTZ \
             ORDER BY rental_ends_at",
        );
        Ok(self
            .query(&sql, &[&awaiting, &now])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(|row| Unreturned(hydrate(row)))
            .collect())
    }
}

impl<C> Database<Select<By<Vec<ReturnPending<Booking>>, RangeInclusive<DateTime>>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<ReturnPending<Booking>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Vec<ReturnPending<Booking>>, RangeInclusive<DateTime>>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let range = by.into_inner();
        let pending: &[DeliveryStatus] = &[
            DeliveryStatus::Delivered,
            DeliveryStatus::ReturnDue,
            DeliveryStatus::ReturnLinkSent,
        ];

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE delivery_status = ANY($1::INT2[]) \
               AND rental_ends_at BETWEEN $2::TIMESTAMPTZ \
                                      AND $3::TIMESTAMPTZ \
             ORDER BY rental_ends_at",
        );
        Ok(self
            .query(&sql, &[&pending, range.start(), range.end()])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(|row| ReturnPending(hydrate(row)))
            .collect())
    }
}

impl<C> Database<Lock<By<Booking, booking::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Booking, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id: booking::Id = by.into_inner();

        self.query(LOCK_SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

#[cfg(test)]
mod spec {
    use super::LOCK_SQL;

    #[test]
    fn lock_blocks_on_an_existing_row() {
        // A `DO NOTHING` conflict path returns without locking the existing
        // row, so two transactions mutating the same booking would proceed
        // concurrently and the later upsert would drop the earlier one's
        // `history`/`refunds` entries.
        assert!(LOCK_SQL.contains("ON CONFLICT (id) DO UPDATE"));
        assert!(!LOCK_SQL.contains("DO NOTHING"));
    }
}
