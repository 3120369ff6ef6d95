//! Stock executors for asynchronous posting.

use herald_core::{Executor, ExecutorError, Task};

/// Runs every task immediately on the posting thread.
///
/// Handles returned with this executor are already resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        task();
        Ok(())
    }
}

/// Runs every task on a new OS thread.
#[derive(Debug, Clone, Default)]
pub struct ThreadExecutor {
    name: Option<String>,
}

impl ThreadExecutor {
    /// Unnamed threads.
    pub fn new() -> Self {
        Self::default()
    }

    /// Threads named `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        let mut builder = std::thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        builder
            .spawn(task)
            .map(drop)
            .map_err(|err| ExecutorError::Spawn(err.to_string()))
    }
}

/// Runs tasks on tokio's blocking pool.
///
/// Listeners are synchronous, so tasks go through `spawn_blocking` rather
/// than onto the async worker threads.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

#[cfg(feature = "tokio")]
impl TokioExecutor {
    /// Use the given runtime.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running in.
    pub fn current() -> Result<Self, ExecutorError> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|err| ExecutorError::Spawn(err.to_string()))
    }
}

#[cfg(feature = "tokio")]
impl Executor for TokioExecutor {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        drop(self.handle.spawn_blocking(task));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn inline_runs_before_returning() {
        let (tx, rx) = mpsc::channel();
        InlineExecutor
            .execute(Box::new(move || tx.send(1).unwrap()))
            .unwrap();
        assert_eq!(rx.try_recv(), Ok(1));
    }

    #[test]
    fn thread_executor_uses_the_configured_name() {
        let (tx, rx) = mpsc::channel();
        ThreadExecutor::named("herald-post")
            .execute(Box::new(move || {
                let name = std::thread::current().name().map(str::to_owned);
                tx.send(name).unwrap();
            }))
            .unwrap();
        assert_eq!(rx.recv().unwrap().as_deref(), Some("herald-post"));
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn tokio_executor_runs_on_the_blocking_pool() {
        let (tx, rx) = futures::channel::oneshot::channel();
        TokioExecutor::current()
            .unwrap()
            .execute(Box::new(move || {
                let _ = tx.send(7);
            }))
            .unwrap();
        assert_eq!(rx.await, Ok(7));
    }
}
