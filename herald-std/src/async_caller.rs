//! Executor-backed asynchronous posting.
//!
//! [`AsyncEventCaller`] wraps the synchronous algorithm of [`EventCaller`]
//! into a task and hands it to an [`Executor`]. The returned [`PostHandle`]
//! is a future that resolves once the task ran, and reports progress through
//! [`PostHandle::state`] in the meantime.

use crate::caller::{EventCaller, InFlightGuard};
use futures::channel::oneshot;
use herald_core::{
    DispatchError, DispatchState, Event, EventType, Executor, ExecutorError, HeraldError,
    ListenerOrder, PostResult, SubscriptionKey, Task,
};
use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    task::{Context, Poll},
};

type PostOutput<E, K, O> = Result<PostResult<E, K, O>, DispatchError>;

/// A post that has been prepared but not run yet.
///
/// Produced by [`AsyncEventCaller::call_with`] and handed to the schedule
/// function, which decides when and where [`run`](Self::run) happens.
/// Dropping it without running resolves the handle with
/// [`DispatchError::Abandoned`].
pub struct DeferredPost<E, K, O> {
    caller: Arc<EventCaller<K, O>>,
    event: E,
    state: Arc<AtomicU8>,
    sender: oneshot::Sender<PostOutput<E, K, O>>,
    _guard: InFlightGuard,
}

impl<E: Event, K: SubscriptionKey, O: ListenerOrder> DeferredPost<E, K, O> {
    /// The event waiting to be posted.
    pub fn event(&self) -> &E {
        &self.event
    }

    /// The runtime type of the event.
    pub fn event_type(&self) -> EventType {
        EventType::of::<E>()
    }

    /// Run the synchronous dispatch on the current thread and resolve the handle.
    pub fn run(self) {
        let DeferredPost {
            caller,
            event,
            state,
            sender,
            _guard,
        } = self;

        let result = caller
            .call_tracked(&event, Some(&state))
            .map(|outcome| PostResult::new(event, outcome));
        // The handle may have been dropped; the post still ran.
        let _ = sender.send(result);
    }

    /// Wrap [`run`](Self::run) into an executor task.
    pub fn into_task(self) -> Task {
        Box::new(move || self.run())
    }
}

impl<E: fmt::Debug, K, O> fmt::Debug for DeferredPost<E, K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredPost")
            .field("event", &self.event)
            .field("state", &DispatchState::from_u8(self.state.load(Ordering::Acquire)))
            .finish_non_exhaustive()
    }
}

enum HandleInner<E, K, O> {
    Waiting(oneshot::Receiver<PostOutput<E, K, O>>),
    Ready(Option<PostOutput<E, K, O>>),
}

/// Completion handle of an asynchronous post.
///
/// Resolves to the same value [`EventCaller::call`] would have returned, or
/// to [`DispatchError::Rejected`] / [`DispatchError::Abandoned`] when the
/// executor refused or dropped the task.
#[must_use = "the post runs regardless, but its result is only observable through the handle"]
pub struct PostHandle<E, K, O> {
    state: Arc<AtomicU8>,
    inner: HandleInner<E, K, O>,
}

impl<E, K, O> PostHandle<E, K, O> {
    /// Current lifecycle state of the post.
    pub fn state(&self) -> DispatchState {
        DispatchState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether dispatch has finished.
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Takes the result if the post already ran. Returns `true` if it did.
    fn settle(&mut self) -> bool {
        if let HandleInner::Waiting(receiver) = &mut self.inner {
            if let Ok(Some(output)) = receiver.try_recv() {
                self.inner = HandleInner::Ready(Some(output));
                return true;
            }
        }
        matches!(self.inner, HandleInner::Ready(_))
    }

    fn reject(&mut self, err: ExecutorError) {
        self.inner = HandleInner::Ready(Some(Err(DispatchError::Rejected(err))));
    }

    /// Block the current thread until the post resolves.
    ///
    /// Must not be called from a thread the executor needs to run the post.
    pub fn wait(self) -> PostOutput<E, K, O> {
        futures::executor::block_on(self)
    }
}

impl<E, K, O> Unpin for PostHandle<E, K, O> {}

impl<E, K, O> Future for PostHandle<E, K, O> {
    type Output = PostOutput<E, K, O>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.inner {
            HandleInner::Ready(output) => {
                Poll::Ready(output.take().unwrap_or(Err(DispatchError::Abandoned)))
            }
            HandleInner::Waiting(receiver) => match Pin::new(receiver).poll(cx) {
                Poll::Ready(Ok(output)) => Poll::Ready(output),
                Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(DispatchError::Abandoned)),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl<E, K, O> fmt::Debug for PostHandle<E, K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostHandle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Posts events on an [`Executor`].
///
/// The listener snapshot is taken when the task runs, not when it is scheduled.
pub struct AsyncEventCaller<K, O> {
    caller: Arc<EventCaller<K, O>>,
    executor: Option<Arc<dyn Executor>>,
}

impl<K: SubscriptionKey, O: ListenerOrder> AsyncEventCaller<K, O> {
    /// Post through `caller`, with no default executor.
    pub fn new(caller: Arc<EventCaller<K, O>>) -> Self {
        Self {
            caller,
            executor: None,
        }
    }

    /// Use `executor` for [`call_async`](Self::call_async).
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// The synchronous caller tasks run.
    pub fn caller(&self) -> &Arc<EventCaller<K, O>> {
        &self.caller
    }

    /// The default executor, if one is configured.
    pub fn executor(&self) -> Option<&Arc<dyn Executor>> {
        self.executor.as_ref()
    }

    /// Post `event` on the default executor.
    ///
    /// Fails with [`HeraldError::NoExecutor`] when none is configured.
    pub fn call_async<E: Event>(&self, event: E) -> Result<PostHandle<E, K, O>, HeraldError> {
        let executor = self.executor.as_ref().ok_or(HeraldError::NoExecutor)?;
        Ok(self.call_async_on(event, &**executor))
    }

    /// Post `event` on `executor`.
    pub fn call_async_on<E: Event>(&self, event: E, executor: &dyn Executor) -> PostHandle<E, K, O> {
        self.call_with(event, |post| executor.execute(post.into_task()))
    }

    /// Let `schedule` decide how the deferred post runs.
    ///
    /// `schedule` may run the post inline, hand it to any executor, or keep
    /// it to run later (for example to batch posts of one event type). An
    /// error from `schedule` resolves the handle with
    /// [`DispatchError::Rejected`], unless the post already ran before the
    /// error was returned; the handle then keeps the post's own result.
    pub fn call_with<E, S>(&self, event: E, schedule: S) -> PostHandle<E, K, O>
    where
        E: Event,
        S: FnOnce(DeferredPost<E, K, O>) -> Result<(), ExecutorError>,
    {
        let (post, mut handle) = self.defer(event);
        if let Err(err) = schedule(post) {
            if handle.settle() {
                #[cfg(feature = "tracing")]
                tracing::debug!(event_type = %EventType::of::<E>(), error = %err, "schedule failed after the post ran");
            } else {
                #[cfg(feature = "tracing")]
                tracing::warn!(event_type = %EventType::of::<E>(), error = %err, "async post rejected");
                handle.reject(err);
            }
        }
        handle
    }

    /// Prepare a post and its handle without scheduling it.
    pub fn defer<E: Event>(&self, event: E) -> (DeferredPost<E, K, O>, PostHandle<E, K, O>) {
        let (sender, receiver) = oneshot::channel();
        let state = Arc::new(AtomicU8::new(DispatchState::Pending as u8));
        let post = DeferredPost {
            caller: Arc::clone(&self.caller),
            event,
            state: Arc::clone(&state),
            sender,
            _guard: self.caller.in_flight().enter(),
        };
        let handle = PostHandle {
            state,
            inner: HandleInner::Waiting(receiver),
        };
        (post, handle)
    }
}

impl<K, O> Clone for AsyncEventCaller<K, O> {
    fn clone(&self) -> Self {
        Self {
            caller: Arc::clone(&self.caller),
            executor: self.executor.clone(),
        }
    }
}

impl<K, O> fmt::Debug for AsyncEventCaller<K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncEventCaller")
            .field("executor", &self.executor.is_some())
            .finish_non_exhaustive()
    }
}
