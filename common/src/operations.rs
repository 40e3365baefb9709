//! Abstract operations handled at the infrastructure seams.

use std::marker::PhantomData;

use crate::Handler;

/// Operation of inserting (or upserting) a value.
#[derive(Clone, Copy, Debug)]
pub struct Insert<T>(pub T);

/// Operation of selecting a value.
#[derive(Clone, Copy, Debug)]
pub struct Select<T>(pub T);

/// Operation of taking an exclusive lock on a value.
#[derive(Clone, Copy, Debug)]
pub struct Lock<T>(pub T);

/// Operation of starting a value.
#[derive(Clone, Copy, Debug)]
pub struct Start<T>(pub T);

/// Operation of performing a value.
#[derive(Clone, Copy, Debug)]
pub struct Perform<T>(pub T);

/// Operation of opening a transaction.
#[derive(Clone, Copy, Debug)]
pub struct Transact;

/// Transactional form of a [`Transact`]able `T`.
pub type Transacted<T> = <T as Handler<Transact>>::Ok;

/// Operation of committing an opened transaction.
#[derive(Clone, Copy, Debug)]
pub struct Commit;

/// Selector of a `W` value by a `B` one.
#[derive(Clone, Copy, Debug)]
pub struct By<W, B> {
    /// Type of the value to select.
    _what: PhantomData<W>,

    /// Value to select by.
    by: B,
}

impl<W, B> By<W, B> {
    /// Creates a new [`By`] selector out of the given value.
    #[must_use]
    pub fn new(by: B) -> Self {
        Self {
            _what: PhantomData,
            by,
        }
    }

    /// Unwraps this [`By`] selector into the value it selects by.
    #[must_use]
    pub fn into_inner(self) -> B {
        self.by
    }
}
