//! [`Error`]-related definitions.

use std::fmt;

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use derive_more::Error as StdError;
use itertools::Itertools as _;
use service::{command, infra::database, query};
use tracerr::{Trace, Traced};
use tracing as log;

/// REST API [`Error`].
#[derive(Clone, Debug, StdError)]
pub struct Error {
    /// [`Error`] code.
    pub code: Code,

    /// [`http::StatusCode`] of this [`Error`].
    pub status_code: http::StatusCode,

    /// Backtrace of this [`Error`].
    #[error(not(backtrace))]
    pub backtrace: Option<Trace>,

    /// [`Error`] message.
    pub message: String,
}

impl Error {
    /// Create a new [`Error`] representing an internal server error.
    #[must_use]
    pub fn internal(msg: &impl ToString) -> Self {
        Self {
            code: "INTERNAL_SERVER_ERROR",
            status_code: http::StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            backtrace: None,
        }
    }

    /// Creates a new [`Error`] with the provided parameters.
    #[must_use]
    pub fn new(
        code: Code,
        status_code: http::StatusCode,
        message: impl ToString,
    ) -> Self {
        Self {
            code,
            status_code,
            message: message.to_string(),
            backtrace: None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            code,
            status_code: _,
            backtrace,
            message,
        } = self;

        write!(
            f,
            "[{code}]: {message}{}",
            backtrace
                .iter()
                .format_with("\n", |trace, f| f(&format_args!("{trace}"))),
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.status_code.is_server_error() {
            log::error!("{self}");
        }

        let body = Json(serde_json::json!({
            "code": self.code,
            "message": self.message,
        }));
        (self.status_code, body).into_response()
    }
}

/// [`Error`] code.
pub type Code = &'static str;

/// Helper trait for converting types into [`Error`]s.
pub trait AsError {
    /// Tries to convert the type into an [`Error`].
    ///
    /// [`None`] is returned if the type cannot be converted into an [`Error`].
    fn try_as_error(&self) -> Option<Error>;

    /// Converts the type into an [`Error`].
    fn as_error(&self) -> Error
    where
        Self: fmt::Display,
    {
        self.try_as_error()
            .unwrap_or_else(|| Error::internal(&self))
    }

    /// Converts the type into an [`Error`] by consuming it.
    fn into_error(self) -> Error
    where
        Self: fmt::Display + Sized,
    {
        self.as_error()
    }
}

impl<E: AsError> AsError for Traced<E> {
    fn try_as_error(&self) -> Option<Error> {
        let mut error = self.as_ref().try_as_error()?;
        error.backtrace = Some(self.trace().clone());
        Some(error)
    }
}

impl AsError for database::Error {
    fn try_as_error(&self) -> Option<Error> {
        None
    }
}

impl AsError for command::apply_payment_event::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use command::apply_payment_event::ExecutionError as E;

        // Unapplicable events are acknowledged and dropped by the command
        // itself, so only infrastructure failures surface here.
        match self {
            E::Db(_) => None,
        }
    }
}

impl AsError for command::submit_return::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use command::submit_return::ExecutionError as E;

        match self {
            E::Db(_) => None,
            E::IllegalTransition(_) => Some(Error::new(
                "ILLEGAL_TRANSITION",
                http::StatusCode::CONFLICT,
                self,
            )),
            E::TokenExpired => Some(Error::new(
                "RETURN_TOKEN_EXPIRED",
                http::StatusCode::GONE,
                self,
            )),
            E::TokenNotFound => Some(Error::new(
                "RETURN_TOKEN_NOT_FOUND",
                http::StatusCode::NOT_FOUND,
                self,
            )),
            E::TrackingNumberRequired => Some(Error::new(
                "TRACKING_NUMBER_REQUIRED",
                http::StatusCode::BAD_REQUEST,
                self,
            )),
        }
    }
}

impl AsError for query::booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use query::booking::ExecutionError as E;

        match self {
            E::Db(_) => None,
            E::TokenExpired => Some(Error::new(
                "RETURN_TOKEN_EXPIRED",
                http::StatusCode::GONE,
                self,
            )),
            E::TokenNotFound => Some(Error::new(
                "RETURN_TOKEN_NOT_FOUND",
                http::StatusCode::NOT_FOUND,
                self,
            )),
        }
    }
}
