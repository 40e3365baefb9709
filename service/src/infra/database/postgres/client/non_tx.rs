//! [`NonTx`] client definitions.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};
use tokio_postgres::{types::ToSql, Row, ToStatement};
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{self, connection, Connection},
};

/// Non-transactional Postgres database client.
///
/// The underlying [`connection::NonTx`] is checked out of the pool lazily, on
/// the first statement run through this client.
#[derive(Clone, Debug)]
pub struct NonTx {
    /// [`connection::Pool`] the connection is checked out of.
    pub(crate) pool: connection::Pool,

    /// Lazily checked out [`connection::NonTx`].
    cached: Arc<RwLock<Option<connection::NonTx>>>,
}

impl NonTx {
    /// Creates a new [`NonTx`] client on top of the provided
    /// [`connection::Pool`].
    #[must_use]
    pub(crate) fn from_pool(pool: connection::Pool) -> Self {
        Self {
            pool,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the [`connection::NonTx`] of this client, checking one out of
    /// the pool if none is cached yet.
    pub(crate) async fn acquire(
        &self,
    ) -> Result<RwLockReadGuard<'_, connection::NonTx>, Traced<database::Error>>
    {
        {
            let cached = self.cached.read().await;
            if cached.is_some() {
                return Ok(RwLockReadGuard::map(cached, |conn| {
                    conn.as_ref().expect("is checked above")
                }));
            }
        }

        let mut cached = self.cached.write().await;
        if cached.is_none() {
            *cached = Some(
                self.pool
                    .get()
                    .await
                    .map_err(tracerr::from_and_wrap!(=> postgres::Error))
                    .map_err(tracerr::map_from)?,
            );
        }
        Ok(RwLockReadGuard::map(cached.downgrade(), |conn| {
            conn.as_ref().expect("is initialized above")
        }))
    }

    /// Takes the cached [`connection::NonTx`] out of this client, leaving it
    /// to check out a fresh one on the next use.
    pub(crate) async fn detach(&self) -> Option<connection::NonTx> {
        self.cached.write().await.take()
    }
}

impl Connection for NonTx {
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
