//! Subscription records.

use crate::{
    error::ListenerError,
    event::{Event, EventType},
    exception::HandlerAction,
    listener::AnyListener,
};
use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

struct Subscription<K, O> {
    key: K,
    order: O,
    sequence: u64,
    listener: AnyListener,
}

/// A listener bound into a registry under a key and an order value.
///
/// Cheap to clone. Equality is identity: two subscriptions of the same
/// [`Listener`](crate::Listener) are distinct records, and only the record
/// returned by `subscribe` (or a clone of it) unsubscribes it.
pub struct SubscribedListener<K, O> {
    inner: Arc<Subscription<K, O>>,
}

impl<K, O> SubscribedListener<K, O> {
    /// Bind `listener` under `key` and `order`.
    ///
    /// `sequence` is the registration sequence number used to break order ties.
    pub fn new(key: K, listener: AnyListener, order: O, sequence: u64) -> Self {
        Self {
            inner: Arc::new(Subscription {
                key,
                order,
                sequence,
                listener,
            }),
        }
    }

    /// The event type the listener was declared for.
    pub fn event_type(&self) -> EventType {
        self.inner.listener.event_type()
    }

    /// The subscription key.
    pub fn key(&self) -> &K {
        &self.inner.key
    }

    /// The order value.
    pub fn order(&self) -> &O {
        &self.inner.order
    }

    /// Registration sequence number.
    pub fn sequence(&self) -> u64 {
        self.inner.sequence
    }

    /// The type-erased listener.
    pub fn listener(&self) -> &AnyListener {
        &self.inner.listener
    }

    /// Invoke the listener, capturing errors and panics.
    pub fn invoke(&self, event: &dyn Event) -> Result<(), ListenerError> {
        self.inner.listener.invoke(event)
    }

    /// Ask the listener's own exception hook for a decision.
    pub fn handle_error(&self, event: &dyn Event, error: &ListenerError) -> Option<HandlerAction> {
        self.inner.listener.handle_error(event, error)
    }

    /// Returns `true` if both handles refer to the same subscription.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<K, O> Clone for SubscribedListener<K, O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, O> PartialEq for SubscribedListener<K, O> {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl<K, O> Eq for SubscribedListener<K, O> {}

impl<K, O> Hash for SubscribedListener<K, O> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl<K: fmt::Debug, O: fmt::Debug> fmt::Debug for SubscribedListener<K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscribedListener")
            .field("event_type", &self.event_type())
            .field("key", &self.inner.key)
            .field("order", &self.inner.order)
            .field("sequence", &self.inner.sequence)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Listener, Priority};
    use std::collections::HashSet;

    struct Tick;
    impl Event for Tick {}

    #[test]
    fn identity_equality() {
        let listener = Listener::infallible(|_: &Tick| {});
        let a = SubscribedListener::new("k", listener.clone().erase(), Priority::NORMAL, 0);
        let b = SubscribedListener::new("k", listener.erase(), Priority::NORMAL, 0);

        assert_ne!(a, b);
        assert_eq!(a, a.clone());

        let set: HashSet<_> = [a.clone(), a.clone(), b.clone()].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn accessors() {
        let sub = SubscribedListener::new("audit", Listener::infallible(|_: &Tick| {}).erase(), Priority::HIGH, 9);
        assert_eq!(sub.event_type(), EventType::of::<Tick>());
        assert_eq!(*sub.key(), "audit");
        assert_eq!(*sub.order(), Priority::HIGH);
        assert_eq!(sub.sequence(), 9);
        assert!(sub.invoke(&Tick).is_ok());
    }
}
