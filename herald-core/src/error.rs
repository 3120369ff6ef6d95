//! Error types for Herald.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`HeraldError`] - Top-level error type for service operations
//! - [`DispatchError`] - Errors that abort or prevent a dispatch
//! - [`ListenerError`] - Errors raised by an individual listener body
//! - [`ConfigError`] - Errors detected while building a service
//! - [`ExecutorError`] - Errors from executors used for async posting
//! - [`KeyError`] - Errors from constructing a [`Key`](crate::Key)

use crate::event::EventType;
use std::{any::Any, sync::Arc};
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all Herald service operations.
#[derive(Error, Debug)]
pub enum HeraldError {
    /// The service (or registry) has been closed.
    #[error("the event service is closed")]
    Closed,

    /// An asynchronous post was requested but no executor was configured.
    #[error("no executor configured for asynchronous posting")]
    NoExecutor,

    /// An error occurred during dispatch.
    #[error("dispatch error: {0}")]
    Dispatch(DispatchError),

    /// The service configuration was invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A key could not be constructed.
    #[error("key error: {0}")]
    Key(#[from] KeyError),
}

impl HeraldError {
    /// Returns `true` if this error reports a closed service.
    pub fn is_closed(&self) -> bool {
        matches!(self, HeraldError::Closed)
    }
}

impl From<DispatchError> for HeraldError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Closed => HeraldError::Closed,
            other => HeraldError::Dispatch(other),
        }
    }
}

/// Errors that abort or prevent a single dispatch.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A listener failed and the active policy asked for the error to be rethrown.
    ///
    /// `source` is the same allocation recorded in the post's failures, so
    /// callers can match it with [`Arc::ptr_eq`].
    #[error("listener `{key}` for {event_type} failed: {source}")]
    Rethrown {
        /// Declared event type of the failing listener.
        event_type: EventType,
        /// Debug rendering of the failing listener's key.
        key: String,
        /// The listener's error.
        #[source]
        source: Arc<ListenerError>,
    },

    /// The registry was closed before dispatch started.
    #[error("dispatcher has been closed")]
    Closed,

    /// The executor refused the dispatch task.
    #[error("executor rejected the dispatch task: {0}")]
    Rejected(#[from] ExecutorError),

    /// The executor dropped the dispatch task without running it.
    #[error("dispatch task was dropped before it ran")]
    Abandoned,
}

impl DispatchError {
    /// The listener error carried by a [`DispatchError::Rethrown`].
    pub fn rethrown(&self) -> Option<&Arc<ListenerError>> {
        match self {
            DispatchError::Rethrown { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors raised while invoking a single listener.
#[derive(Error, Debug)]
pub enum ListenerError {
    /// The listener returned an error.
    #[error("listener failed: {0}")]
    Failed(#[source] BoxError),

    /// The listener panicked.
    #[error("listener panicked: {0}")]
    Panicked(String),

    /// The event handed to the listener was not of the listener's declared type.
    ///
    /// Only reachable when an [`Event`](crate::Event) implementation reports a
    /// parent type that does not match its parent instance.
    #[error("event is not a `{0}`")]
    UnexpectedType(&'static str),
}

impl From<BoxError> for ListenerError {
    fn from(err: BoxError) -> Self {
        ListenerError::Failed(err)
    }
}

/// Errors detected while building an event service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No order comparator or default order was configured.
    #[error("no order comparator configured")]
    MissingOrder,
}

/// Errors reported by an [`Executor`](crate::Executor).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The executor no longer accepts tasks.
    #[error("executor has been shut down")]
    Shutdown,

    /// The executor failed to start the task.
    #[error("failed to spawn task: {0}")]
    Spawn(String),
}

/// Errors from constructing a [`Key`](crate::Key).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The key name was empty.
    #[error("key name must not be empty")]
    EmptyName,

    /// The key namespace was empty.
    #[error("key namespace must not be empty")]
    EmptyNamespace,

    /// The key namespace contained the `:` separator.
    #[error("key namespace must not contain ':'")]
    InvalidNamespace,

    /// A key without namespace had a name containing the `:` separator.
    #[error("key name without namespace must not contain ':'")]
    InvalidName,
}

/// Renders a panic payload caught by [`std::panic::catch_unwind`].
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    #[test]
    fn closed_dispatch_error_maps_to_closed_service_error() {
        let err: HeraldError = DispatchError::Closed.into();
        assert!(err.is_closed());

        let err: HeraldError = DispatchError::Abandoned.into();
        assert!(matches!(err, HeraldError::Dispatch(DispatchError::Abandoned)));
    }

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let payload = panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(panic_message(&*payload), "static message");

        let payload = panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(&*payload), "formatted 42");
    }

    #[test]
    fn listener_error_from_box_error() {
        let boxed: BoxError = "boom".into();
        let err = ListenerError::from(boxed);
        assert_eq!(err.to_string(), "listener failed: boom");
    }
}
