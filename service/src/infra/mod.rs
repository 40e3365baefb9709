//! Infrastructure layer.

pub mod database;
pub mod outbound;

pub use self::database::{Database, InMemory};
#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
pub use self::outbound::Outbound;
