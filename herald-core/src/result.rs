//! Post results.
//!
//! Every post produces a [`PostOutcome`]: the listener failures recorded during
//! dispatch, why dispatch stopped early (if it did), and how many listeners
//! ran. [`PostResult`] pairs it with the posted event.

use crate::{
    error::ListenerError,
    event::{Event, EventType},
    subscription::SubscribedListener,
};
use std::{fmt, sync::Arc};

/// Lifecycle of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DispatchState {
    /// Accepted but not yet started.
    Pending = 0,
    /// Listeners are being invoked.
    Running = 1,
    /// Finished with no listener failure.
    Completed = 2,
    /// Finished with at least one listener failure.
    FailedPartially = 3,
}

impl DispatchState {
    /// Decode a value produced by `state as u8`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => DispatchState::Pending,
            1 => DispatchState::Running,
            2 => DispatchState::Completed,
            _ => DispatchState::FailedPartially,
        }
    }

    /// Whether the dispatch has finished.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DispatchState::Completed | DispatchState::FailedPartially
        )
    }
}

/// Why dispatch skipped the remaining listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// A failure was handled with [`HandlerAction::Break`](crate::HandlerAction::Break).
    Break,
    /// The event was cancelled and the caller stops on cancellation.
    Cancelled,
    /// A failure was handled with [`HandlerAction::Rethrow`](crate::HandlerAction::Rethrow).
    Rethrow,
}

/// A recorded listener failure.
pub struct Failure<K, O> {
    listener: SubscribedListener<K, O>,
    error: Arc<ListenerError>,
}

impl<K, O> Failure<K, O> {
    /// Record `error` raised by `listener`.
    pub fn new(listener: SubscribedListener<K, O>, error: Arc<ListenerError>) -> Self {
        Self { listener, error }
    }

    /// The failing subscription.
    pub fn listener(&self) -> &SubscribedListener<K, O> {
        &self.listener
    }

    /// The error it raised.
    pub fn error(&self) -> &Arc<ListenerError> {
        &self.error
    }
}

impl<K, O> Clone for Failure<K, O> {
    fn clone(&self) -> Self {
        Self {
            listener: self.listener.clone(),
            error: Arc::clone(&self.error),
        }
    }
}

impl<K: fmt::Debug, O: fmt::Debug> fmt::Debug for Failure<K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("listener", &self.listener)
            .field("error", &self.error)
            .finish()
    }
}

/// What happened during one dispatch, independent of the event value.
pub struct PostOutcome<K, O> {
    event_type: EventType,
    failures: Vec<Failure<K, O>>,
    stop_reason: Option<StopReason>,
    invoked: usize,
}

impl<K, O> PostOutcome<K, O> {
    /// Assemble an outcome. Failures are kept in invocation order.
    pub fn new(
        event_type: EventType,
        failures: Vec<Failure<K, O>>,
        stop_reason: Option<StopReason>,
        invoked: usize,
    ) -> Self {
        Self {
            event_type,
            failures,
            stop_reason,
            invoked,
        }
    }

    /// The runtime type of the posted event.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// `true` if no listener failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// `true` if at least one listener failed.
    pub fn is_failure(&self) -> bool {
        !self.failures.is_empty()
    }

    /// [`DispatchState::Completed`] or [`DispatchState::FailedPartially`].
    pub fn state(&self) -> DispatchState {
        if self.is_success() {
            DispatchState::Completed
        } else {
            DispatchState::FailedPartially
        }
    }

    /// Recorded failures, in invocation order.
    pub fn failures(&self) -> &[Failure<K, O>] {
        &self.failures
    }

    /// The error raised by `listener` during this dispatch, if any.
    pub fn error_for(&self, listener: &SubscribedListener<K, O>) -> Option<&Arc<ListenerError>> {
        self.failures
            .iter()
            .find(|failure| failure.listener.same_as(listener))
            .map(|failure| &failure.error)
    }

    /// Why dispatch stopped before the last listener, if it did.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Number of listeners invoked, failed ones included.
    pub fn invoked(&self) -> usize {
        self.invoked
    }
}

impl<K, O> Clone for PostOutcome<K, O> {
    fn clone(&self) -> Self {
        Self {
            event_type: self.event_type,
            failures: self.failures.clone(),
            stop_reason: self.stop_reason,
            invoked: self.invoked,
        }
    }
}

impl<K: fmt::Debug, O: fmt::Debug> fmt::Debug for PostOutcome<K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostOutcome")
            .field("event_type", &self.event_type)
            .field("failures", &self.failures)
            .field("stop_reason", &self.stop_reason)
            .field("invoked", &self.invoked)
            .finish()
    }
}

/// The posted event together with the outcome of its dispatch.
pub struct PostResult<E, K, O> {
    event: E,
    outcome: PostOutcome<K, O>,
}

impl<E, K, O> PostResult<E, K, O> {
    /// Pair an event with its outcome.
    pub fn new(event: E, outcome: PostOutcome<K, O>) -> Self {
        Self { event, outcome }
    }

    /// The posted event, as left by the listeners.
    pub fn event(&self) -> &E {
        &self.event
    }

    /// Take back the posted event.
    pub fn into_event(self) -> E {
        self.event
    }

    /// The dispatch outcome.
    pub fn outcome(&self) -> &PostOutcome<K, O> {
        &self.outcome
    }

    /// Split into event and outcome.
    pub fn into_parts(self) -> (E, PostOutcome<K, O>) {
        (self.event, self.outcome)
    }

    /// See [`PostOutcome::is_success`].
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// See [`PostOutcome::is_failure`].
    pub fn is_failure(&self) -> bool {
        self.outcome.is_failure()
    }

    /// See [`PostOutcome::state`].
    pub fn state(&self) -> DispatchState {
        self.outcome.state()
    }

    /// See [`PostOutcome::failures`].
    pub fn failures(&self) -> &[Failure<K, O>] {
        self.outcome.failures()
    }

    /// See [`PostOutcome::error_for`].
    pub fn error_for(&self, listener: &SubscribedListener<K, O>) -> Option<&Arc<ListenerError>> {
        self.outcome.error_for(listener)
    }

    /// See [`PostOutcome::stop_reason`].
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.outcome.stop_reason()
    }

    /// See [`PostOutcome::invoked`].
    pub fn invoked(&self) -> usize {
        self.outcome.invoked()
    }
}

impl<E: Event, K, O> PostResult<E, K, O> {
    /// A borrowed, type-erased view handed to result observers.
    pub fn report(&self) -> PostReport<'_, K, O> {
        PostReport::new(&self.event, &self.outcome)
    }
}

impl<E: fmt::Debug, K: fmt::Debug, O: fmt::Debug> fmt::Debug for PostResult<E, K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostResult")
            .field("event", &self.event)
            .field("outcome", &self.outcome)
            .finish()
    }
}

/// A completed post as seen by result observers.
pub struct PostReport<'a, K, O> {
    event: &'a dyn Event,
    outcome: &'a PostOutcome<K, O>,
}

impl<'a, K, O> PostReport<'a, K, O> {
    /// Borrow an event and its outcome.
    pub fn new(event: &'a dyn Event, outcome: &'a PostOutcome<K, O>) -> Self {
        Self { event, outcome }
    }

    /// The posted event.
    pub fn event(&self) -> &'a dyn Event {
        self.event
    }

    /// The dispatch outcome.
    pub fn outcome(&self) -> &'a PostOutcome<K, O> {
        self.outcome
    }

    /// The posted event as `E` (or the ancestor part of type `E`).
    pub fn downcast_event<E: Event>(&self) -> Option<&'a E> {
        self.event.downcast_ref::<E>()
    }
}

impl<K, O> Clone for PostReport<'_, K, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, O> Copy for PostReport<'_, K, O> {}

impl<K: fmt::Debug, O: fmt::Debug> fmt::Debug for PostReport<'_, K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostReport")
            .field("event_type", &self.event.event_type())
            .field("outcome", &self.outcome)
            .finish()
    }
}
