//! Background environment running the service's sweeps.

use std::{
    error::Error,
    future::{Future, IntoFuture},
};

use futures::{
    future::{self, LocalBoxFuture},
    FutureExt as _, TryFutureExt as _,
};
use tokio::task;

#[cfg(doc)]
use crate::Task;

/// Boxed error of a spawned [`Task`].
type BoxError = Box<dyn Error + 'static>;

/// Environment owning the spawned background [`Task`]s.
///
/// Awaiting it drives every spawned [`Task`] to completion, resolving once
/// all of them finish or any of them errors.
#[derive(Debug, Default)]
pub struct Background {
    /// [`task::LocalSet`] the [`Task`]s are spawned onto.
    set: task::LocalSet,

    /// Handles of the spawned [`Task`]s.
    spawned: Vec<task::JoinHandle<Result<(), BoxError>>>,
}

impl Background {
    /// Spawns the provided [`Task`] future onto this [`Background`].
    pub fn spawn<F, E>(&mut self, task: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: Error + 'static,
    {
        let handle = self
            .set
            .spawn_local(task.map_err(|e| BoxError::from(Box::new(e))));
        self.spawned.push(handle);
    }
}

impl IntoFuture for Background {
    type Output = Result<(), BoxError>;
    type IntoFuture = LocalBoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { set, spawned } = self;

        let joined = future::try_join_all(spawned.into_iter().map(|handle| {
            handle.map(|res| match res {
                Ok(done) => done,
                Err(e) => Err(BoxError::from(Box::new(e))),
            })
        }))
        .map_ok(drop);

        // The `LocalSet` must be polled alongside the handles for the
        // spawned tasks to make progress.
        future::try_join(set.map(Ok), joined)
            .map_ok(drop)
            .boxed_local()
    }
}
