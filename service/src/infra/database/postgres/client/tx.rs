//! [`Tx`] client definitions.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};
use tokio_postgres::{types::ToSql, Row, ToStatement};
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{self, connection, Connection},
};

use super::NonTx;

/// Transactional Postgres database client.
///
/// The transaction is opened lazily, on the first statement run through this
/// client, reusing the connection of the [`NonTx`] client it was forked from
/// whenever that connection is still around.
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`connection::Pool`] to fall back to when the forked client's
    /// connection is gone already.
    pool: connection::Pool,

    /// State shared between clones of this client.
    shared: Arc<Shared>,
}

/// State shared between clones of a [`Tx`] client.
#[derive(Debug)]
struct Shared {
    /// [`NonTx`] client the transaction is forked from, consumed when the
    /// transaction opens.
    source: RwLock<Option<NonTx>>,

    /// Lazily opened [`connection::Tx`].
    tx: RwLock<Option<connection::Tx>>,
}

impl Tx {
    /// Forks a new [`Tx`] client off the provided [`NonTx`] one.
    #[must_use]
    pub fn from_non_tx(client: NonTx) -> Self {
        Self {
            pool: client.pool.clone(),
            shared: Arc::new(Shared {
                source: RwLock::new(Some(client)),
                tx: RwLock::new(None),
            }),
        }
    }

    /// Commits the transaction of this [`Tx`] client.
    ///
    /// # Errors
    ///
    /// If the commit fails.
    pub async fn commit(&self) -> Result<(), Traced<database::Error>> {
        match self.shared.tx.write().await.take() {
            Some(tx) => tx.commit().await.map_err(tracerr::wrap!()),
            // Nothing was ever run through this client, so there is nothing
            // to commit.
            None => Ok(()),
        }
    }

    /// Returns the [`connection::Tx`] of this client, opening the transaction
    /// if it hasn't been opened yet.
    async fn acquire(
        &self,
    ) -> Result<RwLockReadGuard<'_, connection::Tx>, Traced<database::Error>>
    {
        {
            let tx = self.shared.tx.read().await;
            if tx.is_some() {
                return Ok(RwLockReadGuard::map(tx, |tx| {
                    tx.as_ref().expect("is checked above")
                }));
            }
        }

        let mut tx = self.shared.tx.write().await;
        if tx.is_none() {
            let inherited = match self.shared.source.write().await.take() {
                Some(client) => client.detach().await,
                None => None,
            };
            let conn = match inherited {
                Some(conn) => conn,
                None => self
                    .pool
                    .get()
                    .await
                    .map_err(tracerr::from_and_wrap!(=> postgres::Error))
                    .map_err(tracerr::map_from)?,
            };
            *tx = Some(
                connection::Tx::from_non_tx(conn)
                    .await
                    .map_err(tracerr::wrap!())?,
            );
        }
        Ok(RwLockReadGuard::map(tx.downgrade(), |tx| {
            tx.as_ref().expect("is opened above")
        }))
    }
}

impl Connection for Tx {
    async fn query<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.acquire()
            .await
            .map_err(tracerr::wrap!())?
            .query(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn query_opt<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.acquire()
            .await
            .map_err(tracerr::wrap!())?
            .query_opt(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn exec<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.acquire()
            .await
            .map_err(tracerr::wrap!())?
            .exec(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }
}
