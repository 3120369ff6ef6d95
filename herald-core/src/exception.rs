//! Listener exception handling.
//!
//! When a listener fails, the dispatcher asks for a [`HandlerAction`]: first
//! the listener's own hook (see [`Listener::on_error`](crate::Listener::on_error)),
//! then the service-wide [`ExceptionHandler`]. Every failure is recorded in the
//! post's outcome regardless of the action.

use crate::{error::ListenerError, event::Event, subscription::SubscribedListener};
use std::{fmt, sync::Arc};

/// What the dispatcher does after a listener failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerAction {
    /// Record the failure and continue with the next listener.
    Continue,
    /// Record the failure and skip the remaining listeners.
    Break,
    /// Record the failure, skip the remaining listeners, and return the error to the poster.
    Rethrow,
}

/// Decides how a listener failure affects the rest of a dispatch.
pub trait ExceptionHandler<K, O>: Send + Sync + 'static {
    /// Called once per failed listener invocation.
    fn handle_exception(
        &self,
        event: &dyn Event,
        listener: &SubscribedListener<K, O>,
        error: &ListenerError,
    ) -> HandlerAction;
}

impl<K, O, F> ExceptionHandler<K, O> for F
where
    F: Fn(&dyn Event, &SubscribedListener<K, O>, &ListenerError) -> HandlerAction
        + Send
        + Sync
        + 'static,
{
    fn handle_exception(
        &self,
        event: &dyn Event,
        listener: &SubscribedListener<K, O>,
        error: &ListenerError,
    ) -> HandlerAction {
        self(event, listener, error)
    }
}

/// The built-in policies plus an escape hatch for a custom handler.
pub enum ExceptionPolicy<K, O> {
    /// Always [`HandlerAction::Continue`]. The default.
    Continue,
    /// Always [`HandlerAction::Break`].
    Break,
    /// Always [`HandlerAction::Rethrow`].
    Rethrow,
    /// Delegate to a custom handler.
    Custom(Arc<dyn ExceptionHandler<K, O>>),
}

impl<K, O> ExceptionPolicy<K, O> {
    /// Wrap a custom handler.
    pub fn custom<H: ExceptionHandler<K, O>>(handler: H) -> Self {
        ExceptionPolicy::Custom(Arc::new(handler))
    }

    /// The fixed action of a built-in policy; `None` for custom handlers.
    pub fn fixed_action(&self) -> Option<HandlerAction> {
        match self {
            ExceptionPolicy::Continue => Some(HandlerAction::Continue),
            ExceptionPolicy::Break => Some(HandlerAction::Break),
            ExceptionPolicy::Rethrow => Some(HandlerAction::Rethrow),
            ExceptionPolicy::Custom(_) => None,
        }
    }
}

impl<K: 'static, O: 'static> ExceptionHandler<K, O> for ExceptionPolicy<K, O> {
    fn handle_exception(
        &self,
        event: &dyn Event,
        listener: &SubscribedListener<K, O>,
        error: &ListenerError,
    ) -> HandlerAction {
        match self {
            ExceptionPolicy::Custom(handler) => handler.handle_exception(event, listener, error),
            builtin => builtin.fixed_action().unwrap_or(HandlerAction::Continue),
        }
    }
}

impl<K, O> Default for ExceptionPolicy<K, O> {
    fn default() -> Self {
        ExceptionPolicy::Continue
    }
}

impl<K, O> Clone for ExceptionPolicy<K, O> {
    fn clone(&self) -> Self {
        match self {
            ExceptionPolicy::Continue => ExceptionPolicy::Continue,
            ExceptionPolicy::Break => ExceptionPolicy::Break,
            ExceptionPolicy::Rethrow => ExceptionPolicy::Rethrow,
            ExceptionPolicy::Custom(handler) => ExceptionPolicy::Custom(Arc::clone(handler)),
        }
    }
}

impl<K, O> fmt::Debug for ExceptionPolicy<K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionPolicy::Continue => f.write_str("Continue"),
            ExceptionPolicy::Break => f.write_str("Break"),
            ExceptionPolicy::Rethrow => f.write_str("Rethrow"),
            ExceptionPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
