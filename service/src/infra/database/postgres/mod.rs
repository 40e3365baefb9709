//! Postgres [`Database`] implementation.

pub mod client;
pub mod connection;
mod impls;

use deadpool_postgres::Runtime;
use derive_more::{Deref, Display, Error as StdError, From};
use tokio_postgres::NoTls;
use tracerr::Traced;

use crate::infra::database;
#[cfg(doc)]
use crate::infra::Database;

pub use refinery::embed_migrations;

pub use self::{
    client::{NonTx, Tx},
    connection::Connection,
};

pub use deadpool_postgres::Config;

/// Postgres [`Database`] client, generic over being transactional or not.
#[derive(Clone, Debug, Deref)]
pub struct Postgres<T = NonTx>(T);

impl Postgres {
    /// Creates a new non-transactional [`Postgres`] client out of the
    /// provided [`Config`].
    ///
    /// # Errors
    ///
    /// If the connection pool fails to initialize.
    pub fn new(conf: &Config) -> Result<Self, Traced<database::Error>> {
        let pool = conf
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?;
        Ok(Self(NonTx::from_pool(pool)))
    }
}

/// Error of a [`Postgres`] client.
#[derive(Debug, Display, StdError, From)]
pub enum Error {
    /// [`Connection`] failed to run a statement.
    #[display("`Connection` error: {_0}")]
    Connection(connection::Error),

    /// [`connection::Pool`] failed to initialize.
    #[display("Failed to create a new `connection::Pool`: {_0}")]
    PoolCreationError(connection::PoolCreationError),

    /// [`connection::Pool`] failed to provide a connection.
    #[display("`connection::Pool` error: {_0}")]
    PoolError(connection::PoolError),
}
