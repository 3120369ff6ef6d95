//! The event service: one registry and one dispatch engine behind a cheaply
//! clonable handle.

use crate::{
    builder::EventServiceBuilder,
    subscriber::{BulkSubscriber, ChannelInfo, TypedSubscriber},
};
use herald_core::{
    BoxError, Event, EventType, Executor, ExecutorError, HeraldError, Key, Listener,
    ListenerOrder, PostOutcome, PostReport, PostResult, Priority, SubscribedListener,
    SubscriptionKey,
};
use herald_std::{
    async_caller::{AsyncEventCaller, DeferredPost, PostHandle},
    caller::EventCaller,
    observer::{ObserverId, ResultObserver, ResultObservers},
    registry::ListenerRegistry,
};
use std::{fmt, sync::Arc, time::Duration};

struct Inner<K, O> {
    registry: Arc<ListenerRegistry<K, O>>,
    caller: Arc<EventCaller<K, O>>,
    async_caller: AsyncEventCaller<K, O>,
}

/// An in-process typed event bus.
///
/// Listeners subscribe to an event type and receive every posted event of
/// that type or of any of its subtypes, in order. Clones share the same
/// listeners and observers.
///
/// # Example
///
/// ```rust,ignore
/// let service = EventService::builder().priority_order().build()?;
///
/// service.subscribe_with(Key::new("audit")?, Priority::HIGH, |ping: &Ping| {
///     println!("ping {}", ping.seq);
///     Ok(())
/// })?;
///
/// let result = service.post(Ping { seq: 1 })?;
/// assert!(result.is_success());
/// ```
pub struct EventService<K = Key, O = Priority> {
    inner: Arc<Inner<K, O>>,
}

impl EventService<Key, Priority> {
    /// Start configuring a service keyed by [`Key`] and ordered by [`Priority`].
    ///
    /// An order must be chosen before [`build`](EventServiceBuilder::build)
    /// succeeds, for example with
    /// [`priority_order`](EventServiceBuilder::priority_order).
    pub fn builder() -> EventServiceBuilder<Key, Priority> {
        EventServiceBuilder::new()
    }
}

impl<K: SubscriptionKey, O: ListenerOrder> EventService<K, O> {
    pub(crate) fn from_parts(
        registry: Arc<ListenerRegistry<K, O>>,
        caller: Arc<EventCaller<K, O>>,
        async_caller: AsyncEventCaller<K, O>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                caller,
                async_caller,
            }),
        }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<ListenerRegistry<K, O>> {
        &self.inner.registry
    }

    /// The underlying synchronous caller.
    pub fn caller(&self) -> &Arc<EventCaller<K, O>> {
        &self.inner.caller
    }

    // ------------------------------------------------------------------
    // Subscription
    // ------------------------------------------------------------------

    /// Subscribe `handler` for `E` at the default order.
    pub fn subscribe<E, F>(&self, key: K, handler: F) -> Result<SubscribedListener<K, O>, HeraldError>
    where
        E: Event,
        F: Fn(&E) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.subscribe_listener(key, Listener::new(handler), None)
    }

    /// Subscribe `handler` for `E` at `order`.
    pub fn subscribe_with<E, F>(
        &self,
        key: K,
        order: O,
        handler: F,
    ) -> Result<SubscribedListener<K, O>, HeraldError>
    where
        E: Event,
        F: Fn(&E) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.subscribe_listener(key, Listener::new(handler), Some(order))
    }

    /// Subscribe a prepared [`Listener`], at `order` or the default order.
    pub fn subscribe_listener<E: Event>(
        &self,
        key: K,
        listener: Listener<E>,
        order: Option<O>,
    ) -> Result<SubscribedListener<K, O>, HeraldError> {
        self.inner.registry.subscribe(key, listener, order)
    }

    /// Collect several subscriptions and register them in one step.
    pub fn bulk(&self) -> BulkSubscriber<'_, K, O> {
        BulkSubscriber::new(self)
    }

    /// Remove exactly `record`. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, record: &SubscribedListener<K, O>) -> bool {
        self.inner.registry.unsubscribe(record)
    }

    /// Remove every given record. Returns how many were still subscribed.
    pub fn unsubscribe_all(&self, records: &[SubscribedListener<K, O>]) -> usize {
        self.inner.registry.unsubscribe_all(records)
    }

    /// Remove every record subscribed under `key`, across all event types.
    pub fn unsubscribe_by_key(&self, key: &K) -> Vec<SubscribedListener<K, O>> {
        self.inner.registry.unsubscribe_by_key(key)
    }

    /// Remove every record for which `predicate` holds.
    pub fn unsubscribe_if<P>(&self, predicate: P) -> Vec<SubscribedListener<K, O>>
    where
        P: Fn(&SubscribedListener<K, O>) -> bool,
    {
        self.inner.registry.unsubscribe_if(predicate)
    }

    // ------------------------------------------------------------------
    // Posting
    // ------------------------------------------------------------------

    /// Post `event` synchronously and hand it back with the outcome.
    ///
    /// A failure handled with `Rethrow` is returned as
    /// [`HeraldError::Dispatch`]; [`PostResult::is_failure`] reports every
    /// other failure.
    pub fn post<E: Event>(&self, event: E) -> Result<PostResult<E, K, O>, HeraldError> {
        Ok(self.inner.caller.call(event)?)
    }

    /// Post a borrowed event synchronously.
    pub fn post_ref<E: Event>(&self, event: &E) -> Result<PostOutcome<K, O>, HeraldError> {
        Ok(self.inner.caller.call_ref(event)?)
    }

    /// Post `event` on the configured executor.
    ///
    /// Fails with [`HeraldError::NoExecutor`] if the service was built
    /// without one.
    pub fn post_async<E: Event>(&self, event: E) -> Result<PostHandle<E, K, O>, HeraldError> {
        self.ensure_open()?;
        self.inner.async_caller.call_async(event)
    }

    /// Post `event` on `executor`.
    pub fn post_async_on<E: Event>(
        &self,
        event: E,
        executor: &dyn Executor,
    ) -> Result<PostHandle<E, K, O>, HeraldError> {
        self.ensure_open()?;
        Ok(self.inner.async_caller.call_async_on(event, executor))
    }

    /// Post `event` through a custom `schedule`.
    ///
    /// See [`AsyncEventCaller::call_with`].
    pub fn post_with<E, S>(&self, event: E, schedule: S) -> Result<PostHandle<E, K, O>, HeraldError>
    where
        E: Event,
        S: FnOnce(DeferredPost<E, K, O>) -> Result<(), ExecutorError>,
    {
        self.ensure_open()?;
        Ok(self.inner.async_caller.call_with(event, schedule))
    }

    /// Whether [`post_async`](Self::post_async) has a default executor.
    pub fn has_async_caller(&self) -> bool {
        self.inner.async_caller.executor().is_some()
    }

    fn ensure_open(&self) -> Result<(), HeraldError> {
        if self.is_closed() {
            return Err(HeraldError::Closed);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Result observers
    // ------------------------------------------------------------------

    /// The result observers shared by every post of this service.
    pub fn observers(&self) -> &ResultObservers<K, O> {
        self.inner.caller.observers()
    }

    /// Observe every completed post.
    ///
    /// Fails with [`HeraldError::Closed`] once the service is closed.
    pub fn add_result_observer<F>(&self, observer: F) -> Result<ObserverId, HeraldError>
    where
        F: Fn(&PostReport<'_, K, O>) + Send + Sync + 'static,
    {
        self.add_observer(observer)
    }

    /// Register any [`ResultObserver`].
    ///
    /// Fails with [`HeraldError::Closed`] once the service is closed.
    pub fn add_observer<R: ResultObserver<K, O>>(&self, observer: R) -> Result<ObserverId, HeraldError> {
        self.ensure_open()?;
        let id = self.observers().add_observer(observer);
        // `close` may have cleared the observers between the check and the add.
        if self.is_closed() {
            self.observers().remove(id);
            return Err(HeraldError::Closed);
        }
        Ok(id)
    }

    /// Stop notifying an observer. Returns `false` if it was not registered.
    pub fn remove_result_observer(&self, id: ObserverId) -> bool {
        self.observers().remove(id)
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// A typed view of the channel for events of type `E`.
    pub fn subscriber<E: Event>(&self) -> TypedSubscriber<E, K, O> {
        TypedSubscriber::new(self.clone())
    }

    /// One entry per event type that has listeners, in first-registration order.
    pub fn subscribers(&self) -> Vec<ChannelInfo> {
        let registry = &self.inner.registry;
        registry
            .event_types()
            .into_iter()
            .map(|event_type| ChannelInfo::new(event_type, registry.count_for(event_type)))
            .collect()
    }

    /// The listeners a post of `E` is dispatched to, in order.
    pub fn listeners_for<E: Event>(&self) -> Vec<SubscribedListener<K, O>> {
        self.inner.registry.listeners_for(EventType::of::<E>())
    }

    /// Every subscription.
    pub fn all_listeners(&self) -> Vec<SubscribedListener<K, O>> {
        self.inner.registry.all_listeners()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.registry.is_closed()
    }

    /// Close the service.
    ///
    /// Subscriptions and posts fail with [`HeraldError::Closed`] from now on.
    /// Every listener and result observer is released. Posts whose dispatch
    /// already started run to completion; scheduled posts that have not
    /// started resolve to [`HeraldError::Closed`]. Returns the number of
    /// released subscriptions.
    pub fn close(&self) -> usize {
        let released = self.inner.registry.close();
        self.observers().clear();

        #[cfg(feature = "tracing")]
        tracing::info!(released, in_flight = self.inner.caller.in_flight().count(), "event service closed");

        released
    }

    /// Wait until no post is in flight, for at most `timeout`.
    ///
    /// Returns `true` if every post finished in time.
    pub fn drain(&self, timeout: Duration) -> bool {
        self.inner.caller.in_flight().wait_idle(timeout)
    }
}

impl<K, O> Clone for EventService<K, O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: SubscriptionKey, O: ListenerOrder> fmt::Debug for EventService<K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventService")
            .field("registry", &self.inner.registry)
            .field("caller", &self.inner.caller)
            .field("async", &self.has_async_caller())
            .finish()
    }
}
