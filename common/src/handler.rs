//! [`Handler`] abstraction.

use std::future::Future;

/// Asynchronous handler of an operation.
///
/// Commands, queries, tasks and infrastructure seams all plug into this
/// single abstraction, differing only in the operation they handle.
pub trait Handler<Op = ()> {
    /// Type of the value produced by a successful execution.
    type Ok;

    /// Type of the error produced by a failed execution.
    type Err;

    /// Executes this [`Handler`] with the provided operation.
    fn execute(
        &self,
        op: Op,
    ) -> impl Future<Output = Result<Self::Ok, Self::Err>>;
}
