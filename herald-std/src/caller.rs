//! Synchronous dispatch engine.
//!
//! [`EventCaller`] resolves the ordered listeners of a posted event, invokes
//! them strictly in order, applies the exception policy to every failure and
//! hands the outcome to the result observers.

use crate::{observer::ResultObservers, registry::ListenerRegistry};
use herald_core::{
    DispatchError, DispatchState, Event, ExceptionHandler, ExceptionPolicy, Failure,
    HandlerAction, ListenerError, ListenerOrder, PostOutcome, PostReport, PostResult, StopReason,
    SubscribedListener, SubscriptionKey, panic_message,
};
use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Condvar, Mutex, PoisonError,
        atomic::{AtomicU8, Ordering},
    },
    time::{Duration, Instant},
};

/// How dispatch reacts to a cancellable event being cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CancelPolicy {
    /// Invoke every listener regardless of cancellation.
    #[default]
    Ignore,
    /// After each listener returns, skip the remaining listeners if the event
    /// reports itself cancelled.
    StopOnCancel,
}

/// Counts posts in progress so that shutdown can wait for them.
#[derive(Debug, Default)]
pub struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    /// A counter with nothing in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a post as in flight until the returned guard is dropped.
    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        InFlightGuard {
            in_flight: Arc::clone(self),
        }
    }

    /// Number of posts in flight.
    pub fn count(&self) -> usize {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until nothing is in flight or `timeout` elapses.
    ///
    /// Returns `true` if everything finished. Calling this from inside a
    /// listener waits for that listener's own post and therefore times out.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            count = self
                .idle
                .wait_timeout(count, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// Keeps a post counted by [`InFlight`] while alive.
#[must_use = "the post stops being counted as soon as the guard is dropped"]
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self
            .in_flight
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.in_flight.idle.notify_all();
        }
    }
}

/// A dispatch that ran to completion (possibly stopped early).
pub(crate) struct Dispatched<K, O> {
    pub(crate) outcome: PostOutcome<K, O>,
    pub(crate) rethrown: Option<DispatchError>,
}

/// Runs the dispatch algorithm against a [`ListenerRegistry`].
pub struct EventCaller<K, O> {
    registry: Arc<ListenerRegistry<K, O>>,
    exception_policy: ExceptionPolicy<K, O>,
    cancel_policy: CancelPolicy,
    observers: Arc<ResultObservers<K, O>>,
    in_flight: Arc<InFlight>,
}

impl<K: SubscriptionKey, O: ListenerOrder> EventCaller<K, O> {
    /// A caller with the `Continue` policy, ignoring cancellation and with no observers.
    pub fn new(registry: Arc<ListenerRegistry<K, O>>) -> Self {
        Self {
            registry,
            exception_policy: ExceptionPolicy::default(),
            cancel_policy: CancelPolicy::default(),
            observers: Arc::new(ResultObservers::new()),
            in_flight: Arc::new(InFlight::new()),
        }
    }

    /// Use `policy` for listeners without their own exception hook.
    pub fn with_exception_policy(mut self, policy: ExceptionPolicy<K, O>) -> Self {
        self.exception_policy = policy;
        self
    }

    /// Set the cancellation policy.
    pub fn with_cancel_policy(mut self, policy: CancelPolicy) -> Self {
        self.cancel_policy = policy;
        self
    }

    /// Share an existing observer set.
    pub fn with_observers(mut self, observers: Arc<ResultObservers<K, O>>) -> Self {
        self.observers = observers;
        self
    }

    /// The registry listeners are resolved from.
    pub fn registry(&self) -> &Arc<ListenerRegistry<K, O>> {
        &self.registry
    }

    /// The result observers notified after every post.
    pub fn observers(&self) -> &Arc<ResultObservers<K, O>> {
        &self.observers
    }

    /// The global exception policy.
    pub fn exception_policy(&self) -> &ExceptionPolicy<K, O> {
        &self.exception_policy
    }

    /// The cancellation policy.
    pub fn cancel_policy(&self) -> CancelPolicy {
        self.cancel_policy
    }

    /// Posts in flight through this caller, async ones included.
    pub fn in_flight(&self) -> &Arc<InFlight> {
        &self.in_flight
    }

    /// Post `event` and hand it back with the outcome.
    ///
    /// Returns `Err(DispatchError::Rethrown)` when a failure was handled with
    /// [`HandlerAction::Rethrow`]; the observers have seen the outcome by then.
    pub fn call<E: Event>(&self, event: E) -> Result<PostResult<E, K, O>, DispatchError> {
        let _guard = self.in_flight.enter();
        let outcome = self.call_tracked(&event, None)?;
        Ok(PostResult::new(event, outcome))
    }

    /// Post a borrowed event. Same algorithm as [`call`](Self::call).
    pub fn call_ref<E: Event>(&self, event: &E) -> Result<PostOutcome<K, O>, DispatchError> {
        let _guard = self.in_flight.enter();
        self.call_tracked(event, None)
    }

    /// Dispatch, notify observers, and surface a rethrown failure.
    pub(crate) fn call_tracked(
        &self,
        event: &dyn Event,
        state: Option<&AtomicU8>,
    ) -> Result<PostOutcome<K, O>, DispatchError> {
        let Dispatched { outcome, rethrown } = self.dispatch(event, state)?;
        self.observers.notify(&PostReport::new(event, &outcome));
        match rethrown {
            Some(err) => Err(err),
            None => Ok(outcome),
        }
    }

    fn dispatch(
        &self,
        event: &dyn Event,
        state: Option<&AtomicU8>,
    ) -> Result<Dispatched<K, O>, DispatchError> {
        if self.registry.is_closed() {
            return Err(DispatchError::Closed);
        }
        let set_state = |next: DispatchState| {
            if let Some(state) = state {
                state.store(next as u8, Ordering::Release);
            }
        };
        set_state(DispatchState::Running);

        let event_type = event.event_type();
        let listeners = self.registry.listeners_for(event_type);
        let mut failures = Vec::new();
        let mut stop_reason = None;
        let mut rethrown = None;
        let mut invoked = 0;

        for (index, listener) in listeners.iter().enumerate() {
            invoked += 1;
            if let Err(error) = listener.invoke(event) {
                let error = Arc::new(error);
                let action = self.decide(event, listener, &error);

                #[cfg(feature = "tracing")]
                tracing::warn!(
                    event_type = %event_type,
                    listener = %listener.event_type(),
                    key = ?listener.key(),
                    error = %error,
                    action = ?action,
                    "listener failed"
                );

                failures.push(Failure::new(listener.clone(), Arc::clone(&error)));
                match action {
                    HandlerAction::Continue => {}
                    HandlerAction::Break => {
                        stop_reason = Some(StopReason::Break);
                        break;
                    }
                    HandlerAction::Rethrow => {
                        stop_reason = Some(StopReason::Rethrow);
                        rethrown = Some(DispatchError::Rethrown {
                            event_type: listener.event_type(),
                            key: format!("{:?}", listener.key()),
                            source: error,
                        });
                        break;
                    }
                }
            }

            let remaining = index + 1 < listeners.len();
            if remaining && self.cancel_policy == CancelPolicy::StopOnCancel && event.is_cancelled()
            {
                stop_reason = Some(StopReason::Cancelled);
                break;
            }
        }

        let outcome = PostOutcome::new(event_type, failures, stop_reason, invoked);
        set_state(outcome.state());
        Ok(Dispatched { outcome, rethrown })
    }

    /// The listener's own hook decides first, then the global policy.
    /// A panicking handler counts as `Continue`.
    fn decide(
        &self,
        event: &dyn Event,
        listener: &SubscribedListener<K, O>,
        error: &ListenerError,
    ) -> HandlerAction {
        let decision = catch_unwind(AssertUnwindSafe(|| {
            match listener.handle_error(event, error) {
                Some(action) => action,
                None => self.exception_policy.handle_exception(event, listener, error),
            }
        }));

        decision.unwrap_or_else(|payload| {
            let message = panic_message(&*payload);
            #[cfg(feature = "tracing")]
            tracing::warn!(
                event_type = %event.event_type(),
                key = ?listener.key(),
                panic = %message,
                "exception handler panicked; continuing"
            );
            #[cfg(not(feature = "tracing"))]
            let _ = message;
            HandlerAction::Continue
        })
    }
}

impl<K: SubscriptionKey, O: ListenerOrder> fmt::Debug for EventCaller<K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCaller")
            .field("exception_policy", &self.exception_policy)
            .field("cancel_policy", &self.cancel_policy)
            .field("observers", &self.observers.len())
            .field("in_flight", &self.in_flight.count())
            .finish()
    }
}
