//! # Listeners
//!
//! A [`Listener`] wraps the handler function for one event type together with
//! an optional exception hook. It holds no reference to any registry: the
//! same listener may be subscribed many times, each subscription producing an
//! independent [`SubscribedListener`](crate::SubscribedListener).
//!
//! Handlers return `Result<(), BoxError>`. Errors and panics are both captured
//! as a [`ListenerError`] and handed to the exception-handling policy.

use crate::{
    error::{BoxError, ListenerError, panic_message},
    event::{Event, EventType},
    exception::HandlerAction,
};
use std::{
    any::type_name,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

type HandlerFn<E> = dyn Fn(&E) -> Result<(), BoxError> + Send + Sync;
type ErrorHookFn<E> = dyn Fn(&E, &ListenerError) -> HandlerAction + Send + Sync;

/// A handler for events of type `E`.
///
/// # Example
///
/// ```rust,ignore
/// let listener = Listener::new(|event: &Ping| {
///     if event.ttl == 0 {
///         return Err("expired".into());
///     }
///     Ok(())
/// })
/// .on_error(|_event, _error| HandlerAction::Break);
/// ```
pub struct Listener<E: Event> {
    handler: Arc<HandlerFn<E>>,
    on_error: Option<Arc<ErrorHookFn<E>>>,
}

impl<E: Event> Listener<E> {
    /// Create a listener from a fallible handler.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&E) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            on_error: None,
        }
    }

    /// Create a listener from a handler that cannot fail.
    pub fn infallible<F>(handler: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        Self::new(move |event: &E| {
            handler(event);
            Ok(())
        })
    }

    /// Attach an exception hook that decides what happens when this listener fails.
    ///
    /// The hook takes precedence over the service-wide exception policy.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&E, &ListenerError) -> HandlerAction + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Whether an exception hook is attached.
    pub fn has_error_hook(&self) -> bool {
        self.on_error.is_some()
    }

    /// Invoke the handler directly, capturing errors and panics.
    pub fn handle(&self, event: &E) -> Result<(), ListenerError> {
        match catch_unwind(AssertUnwindSafe(|| (self.handler)(event))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(ListenerError::Failed(err)),
            Err(payload) => Err(ListenerError::Panicked(panic_message(&*payload))),
        }
    }

    /// Erase the event type.
    pub fn erase(self) -> AnyListener {
        AnyListener::from(self)
    }
}

impl<E: Event> Clone for Listener<E> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            on_error: self.on_error.clone(),
        }
    }
}

impl<E: Event> fmt::Debug for Listener<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("event", &type_name::<E>())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Object-safe view of a [`Listener`] used once the event type is erased.
trait ErasedListener: Send + Sync {
    fn invoke(&self, event: &dyn Event) -> Result<(), ListenerError>;

    fn handle_error(&self, event: &dyn Event, error: &ListenerError) -> Option<HandlerAction>;
}

impl<E: Event> ErasedListener for Listener<E> {
    fn invoke(&self, event: &dyn Event) -> Result<(), ListenerError> {
        match event.downcast_ref::<E>() {
            Some(typed) => self.handle(typed),
            None => Err(ListenerError::UnexpectedType(type_name::<E>())),
        }
    }

    fn handle_error(&self, event: &dyn Event, error: &ListenerError) -> Option<HandlerAction> {
        let hook = self.on_error.as_ref()?;
        let typed = event.downcast_ref::<E>()?;
        Some(hook(typed, error))
    }
}

/// A listener whose event type has been erased.
///
/// Produced from any [`Listener`] via `From`; registries store these.
#[derive(Clone)]
pub struct AnyListener {
    event_type: EventType,
    inner: Arc<dyn ErasedListener>,
}

impl AnyListener {
    /// The event type this listener was declared for.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Invoke the listener with `event` or the ancestor part matching its declared type.
    pub fn invoke(&self, event: &dyn Event) -> Result<(), ListenerError> {
        self.inner.invoke(event)
    }

    /// Ask the listener's own exception hook for a decision.
    ///
    /// Returns `None` when no hook is attached. Panics raised by the hook propagate.
    pub fn handle_error(&self, event: &dyn Event, error: &ListenerError) -> Option<HandlerAction> {
        self.inner.handle_error(event, error)
    }
}

impl<E: Event> From<Listener<E>> for AnyListener {
    fn from(listener: Listener<E>) -> Self {
        Self {
            event_type: EventType::of::<E>(),
            inner: Arc::new(listener),
        }
    }
}

impl fmt::Debug for AnyListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyListener")
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}
