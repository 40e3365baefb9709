//! [`chat::Room`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{booking, chat, user},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Columns of the `chat_rooms` table, in hydration order.
const COLUMNS: &str = "id, booking_id, participants, created_at";

/// Hydrates a [`chat::Room`] from the provided [`COLUMNS`] row.
fn hydrate(row: &Row) -> chat::Room {
    chat::Room {
        id: row.get("id"),
        booking_id: row.get("booking_id"),
        participants: row
            .get::<_, Vec<user::Id>>("participants")
            .try_into()
            .expect("exactly two participants"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Insert<chat::Room>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(room): Insert<chat::Room>,
    ) -> Result<Self::Ok, Self::Err> {
        let chat::Room {
            id,
            booking_id,
            participants,
            created_at,
        } = room;
        let participants = participants.to_vec();

        // The unique `booking_id` conflict keeps the room singular per
        // booking under redelivered checkout events.
        const SQL: &str = "\
            INSERT INTO chat_rooms (\
                id, booking_id, participants, created_at \
            ) VALUES (\
                $1::UUID, $2::UUID, $3::UUID[], $4::TIMESTAMPTZ \
            ) \
            ON CONFLICT (booking_id) DO NOTHING";
        self.exec(SQL, &[&id, &booking_id, &participants, &created_at])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Select<By<Option<chat::Room>, booking::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<chat::Room>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<chat::Room>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let booking_id: booking::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM chat_rooms \
             WHERE booking_id = $1::UUID \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&booking_id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(hydrate))
    }
}
