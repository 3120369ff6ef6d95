//! The executor abstraction used for asynchronous posting.

use crate::error::ExecutorError;
use std::sync::Arc;

/// A unit of work handed to an [`Executor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs dispatch tasks, possibly on another thread.
///
/// An executor may reject a task with an [`ExecutorError`]; the post then
/// resolves to a rejection instead of running. Dropping a task without
/// running it resolves the post as abandoned.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot run dispatch tasks",
    label = "not an `Executor`",
    note = "Implement `Executor` or use one of the stock executors in `herald::executor`."
)]
pub trait Executor: Send + Sync + 'static {
    /// Schedule `task`.
    fn execute(&self, task: Task) -> Result<(), ExecutorError>;
}

impl<X: Executor + ?Sized> Executor for Arc<X> {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        (**self).execute(task)
    }
}
