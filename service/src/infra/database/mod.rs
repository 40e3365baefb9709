//! [`Database`] seam and its implementations.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use derive_more::{Display, Error as StdError, From};

pub use self::in_memory::InMemory;
#[cfg(feature = "postgres")]
pub use self::postgres::Postgres;

/// Handler of database operations.
pub use common::Handler as Database;

/// Error of a [`Database`] operation.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    #[cfg(feature = "postgres")]
    /// [`Postgres`] error.
    Postgres(postgres::Error),
}
