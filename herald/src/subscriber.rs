//! Typed and bulk views onto an [`EventService`].

use crate::service::EventService;
use herald_core::{
    BoxError, Event, EventType, HeraldError, Listener, ListenerOrder, PostResult,
    SubscribedListener, SubscriptionKey,
};
use herald_std::{async_caller::PostHandle, registry::PendingListener};
use std::{fmt, marker::PhantomData};

/// The channel of one event type on an [`EventService`].
///
/// Obtained from [`EventService::subscriber`].
pub struct TypedSubscriber<E, K, O> {
    service: EventService<K, O>,
    _event: PhantomData<fn() -> E>,
}

impl<E: Event, K: SubscriptionKey, O: ListenerOrder> TypedSubscriber<E, K, O> {
    pub(crate) fn new(service: EventService<K, O>) -> Self {
        Self {
            service,
            _event: PhantomData,
        }
    }

    /// The event type of this channel.
    pub fn event_type(&self) -> EventType {
        EventType::of::<E>()
    }

    /// Subscribe `handler` at the default order.
    pub fn subscribe<F>(&self, key: K, handler: F) -> Result<SubscribedListener<K, O>, HeraldError>
    where
        F: Fn(&E) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.service.subscribe::<E, F>(key, handler)
    }

    /// Subscribe `handler` at `order`.
    pub fn subscribe_with<F>(
        &self,
        key: K,
        order: O,
        handler: F,
    ) -> Result<SubscribedListener<K, O>, HeraldError>
    where
        F: Fn(&E) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.service.subscribe_with::<E, F>(key, order, handler)
    }

    /// Subscribe a prepared listener.
    pub fn subscribe_listener(
        &self,
        key: K,
        listener: Listener<E>,
        order: Option<O>,
    ) -> Result<SubscribedListener<K, O>, HeraldError> {
        self.service.subscribe_listener(key, listener, order)
    }

    /// The listeners a post on this channel reaches, supertype listeners included.
    pub fn listeners(&self) -> Vec<SubscribedListener<K, O>> {
        self.service.listeners_for::<E>()
    }

    /// Post on this channel.
    pub fn post(&self, event: E) -> Result<PostResult<E, K, O>, HeraldError> {
        self.service.post(event)
    }

    /// Post on this channel using the service's executor.
    pub fn post_async(&self, event: E) -> Result<PostHandle<E, K, O>, HeraldError> {
        self.service.post_async(event)
    }

    /// Remove the listeners subscribed under `key` for exactly this event type.
    pub fn unsubscribe_by_key(&self, key: &K) -> Vec<SubscribedListener<K, O>> {
        let event_type = self.event_type();
        self.service
            .unsubscribe_if(|record| record.event_type() == event_type && record.key() == key)
    }
}

impl<E, K, O> Clone for TypedSubscriber<E, K, O> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            _event: PhantomData,
        }
    }
}

impl<E: Event, K: SubscriptionKey, O: ListenerOrder> fmt::Debug for TypedSubscriber<E, K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedSubscriber")
            .field("event_type", &self.event_type())
            .finish_non_exhaustive()
    }
}

/// Summary of one event type's channel, from [`EventService::subscribers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    event_type: EventType,
    listeners: usize,
}

impl ChannelInfo {
    pub(crate) fn new(event_type: EventType, listeners: usize) -> Self {
        Self {
            event_type,
            listeners,
        }
    }

    /// The event type.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// The declared parent type.
    pub fn parent(&self) -> Option<EventType> {
        self.event_type.parent()
    }

    /// Number of listeners declared exactly for this type.
    pub fn listeners(&self) -> usize {
        self.listeners
    }
}

/// Collects subscriptions to register in one step.
///
/// Obtained from [`EventService::bulk`]. Nothing is subscribed until
/// [`subscribe`](Self::subscribe); if the service is closed by then, nothing
/// is subscribed at all.
#[must_use = "nothing is subscribed until `subscribe` is called"]
pub struct BulkSubscriber<'a, K, O> {
    service: &'a EventService<K, O>,
    pending: Vec<PendingListener<K, O>>,
}

impl<'a, K: SubscriptionKey, O: ListenerOrder> BulkSubscriber<'a, K, O> {
    pub(crate) fn new(service: &'a EventService<K, O>) -> Self {
        Self {
            service,
            pending: Vec::new(),
        }
    }

    /// Add `handler` for `E` at the default order.
    pub fn add<E, F>(self, key: K, handler: F) -> Self
    where
        E: Event,
        F: Fn(&E) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.add_listener(key, Listener::new(handler), None)
    }

    /// Add `handler` for `E` at `order`.
    pub fn add_with<E, F>(self, key: K, order: O, handler: F) -> Self
    where
        E: Event,
        F: Fn(&E) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.add_listener(key, Listener::new(handler), Some(order))
    }

    /// Add a prepared listener.
    pub fn add_listener<E: Event>(mut self, key: K, listener: Listener<E>, order: Option<O>) -> Self {
        let pending = PendingListener::new(key, listener);
        self.pending.push(match order {
            Some(order) => pending.with_order(order),
            None => pending,
        });
        self
    }

    /// Number of collected subscriptions.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// `true` if nothing was added.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Subscribe everything collected. Records are returned in the order added.
    pub fn subscribe(self) -> Result<Vec<SubscribedListener<K, O>>, HeraldError> {
        self.service.registry().subscribe_all(self.pending)
    }
}

impl<K: fmt::Debug, O: fmt::Debug> fmt::Debug for BulkSubscriber<'_, K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkSubscriber")
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
