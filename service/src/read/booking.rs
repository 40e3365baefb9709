//! [`Booking`] read model definitions.

#[cfg(doc)]
use crate::domain::Booking;

/// Wrapper around a [`Booking`] still awaiting its return past the end of
/// the rental window.
#[derive(Clone, Copy, Debug)]
pub struct Unreturned<T>(pub T);

/// Wrapper around a [`Booking`] whose return comes due within the selected
/// range and whose reminders are not stopped.
#[derive(Clone, Copy, Debug)]
pub struct ReturnPending<T>(pub T);
