//! [`Booking`]-related [`Query`] definitions.

use common::{
    operations::{By, Select},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{booking::return_flow, Booking},
    infra::{database, Database},
    Service,
};

use super::Query;

/// [`Query`] resolving a [`Booking`] by its live return
/// [`return_flow::Token`].
///
/// Expiry is enforced at resolution time: an expired token resolves the
/// [`Booking`] but yields [`ExecutionError::TokenExpired`].
#[derive(Clone, Debug)]
pub struct ByReturnToken(pub return_flow::Token);

impl<Db, Out> Query<ByReturnToken> for Service<Db, Out>
where
    Db: Database<
        Select<By<Option<Booking>, return_flow::Token>>,
        Ok = Option<Booking>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        ByReturnToken(token): ByReturnToken,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let booking = self
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(token)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::TokenNotFound)
            .map_err(tracerr::wrap!())?;

        let expired = booking
            .return_flow()
            .token_expires_at
            .is_some_and(|at| at < DateTime::now().coerce());
        if expired {
            return Err(tracerr::new!(E::TokenExpired));
        }

        Ok(booking)
    }
}

/// Error of [`ByReturnToken`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Return token has expired.
    #[display("return token has expired")]
    TokenExpired,

    /// No [`Booking`] matches the provided return token.
    #[display("no booking matches the provided return token")]
    TokenNotFound,
}
