//! Listener registry.
//!
//! Maps every event type to a sorted, immutable snapshot of its subscriptions.
//! Writers build a new snapshot and swap it in under the write lock; readers
//! clone the `Arc` under a short read lock and iterate without holding it, so
//! a dispatch in progress is never affected by a concurrent unsubscribe.

use herald_core::{
    AnyListener, Event, EventType, HeraldError, Listener, ListenerOrder, OrderComparator,
    SubscribedListener, SubscriptionKey,
};
use std::{
    any::TypeId,
    cmp::Ordering as CmpOrdering,
    collections::HashMap,
    fmt,
    sync::{
        Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicU64, Ordering},
    },
};

type Snapshot<K, O> = Arc<[SubscribedListener<K, O>]>;

struct Holder<K, O> {
    event_type: EventType,
    listeners: Snapshot<K, O>,
}

struct State<K, O> {
    holders: HashMap<TypeId, Holder<K, O>>,
    /// Event types in first-registration order.
    registration: Vec<TypeId>,
    closed: bool,
}

impl<K, O> State<K, O> {
    fn replace(&mut self, id: TypeId, listeners: Vec<SubscribedListener<K, O>>) {
        if listeners.is_empty() {
            self.holders.remove(&id);
            self.registration.retain(|registered| *registered != id);
        } else if let Some(holder) = self.holders.get_mut(&id) {
            holder.listeners = listeners.into();
        }
    }
}

/// Event types of `records`, each once, in order of first appearance.
fn distinct_types<K, O>(records: &[SubscribedListener<K, O>]) -> Vec<TypeId> {
    let mut ids = Vec::new();
    for record in records {
        let id = record.event_type().id();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// A listener waiting to be subscribed through [`ListenerRegistry::subscribe_all`].
pub struct PendingListener<K, O> {
    key: K,
    listener: AnyListener,
    order: Option<O>,
}

impl<K, O> PendingListener<K, O> {
    /// A pending subscription at the registry's default order.
    pub fn new<E: Event>(key: K, listener: Listener<E>) -> Self {
        Self {
            key,
            listener: listener.erase(),
            order: None,
        }
    }

    /// Use `order` instead of the registry's default.
    pub fn with_order(mut self, order: O) -> Self {
        self.order = Some(order);
        self
    }

    /// The event type the listener is declared for.
    pub fn event_type(&self) -> EventType {
        self.listener.event_type()
    }
}

impl<K: fmt::Debug, O: fmt::Debug> fmt::Debug for PendingListener<K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingListener")
            .field("event_type", &self.listener.event_type())
            .field("key", &self.key)
            .field("order", &self.order)
            .finish()
    }
}

/// Thread-safe store of subscriptions keyed by event type.
///
/// Listeners are kept sorted by the injected [`OrderComparator`], ties broken
/// by a registry-wide registration sequence.
pub struct ListenerRegistry<K, O> {
    comparator: OrderComparator<O>,
    default_order: O,
    sequence: AtomicU64,
    state: RwLock<State<K, O>>,
}

impl<K: SubscriptionKey, O: ListenerOrder> ListenerRegistry<K, O> {
    /// Create an empty registry.
    pub fn new(comparator: OrderComparator<O>, default_order: O) -> Self {
        Self {
            comparator,
            default_order,
            sequence: AtomicU64::new(0),
            state: RwLock::new(State {
                holders: HashMap::new(),
                registration: Vec::new(),
                closed: false,
            }),
        }
    }

    /// The comparator used to order listeners.
    pub fn comparator(&self) -> &OrderComparator<O> {
        &self.comparator
    }

    /// The order used when a subscription specifies none.
    pub fn default_order(&self) -> &O {
        &self.default_order
    }

    fn read(&self) -> RwLockReadGuard<'_, State<K, O>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State<K, O>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn compare(&self, a: &SubscribedListener<K, O>, b: &SubscribedListener<K, O>) -> CmpOrdering {
        self.comparator
            .compare(a.order(), b.order())
            .then_with(|| a.sequence().cmp(&b.sequence()))
    }

    fn record(&self, key: K, listener: AnyListener, order: Option<O>) -> SubscribedListener<K, O> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let order = order.unwrap_or_else(|| self.default_order.clone());
        SubscribedListener::new(key, listener, order, sequence)
    }

    /// Insert records that all share one event type.
    fn insert(&self, state: &mut State<K, O>, records: &[SubscribedListener<K, O>]) {
        let Some(first) = records.first() else {
            return;
        };
        let event_type = first.event_type();
        let id = event_type.id();

        let mut listeners: Vec<_> = match state.holders.get(&id) {
            Some(holder) => holder.listeners.to_vec(),
            None => {
                state.registration.push(id);
                Vec::with_capacity(records.len())
            }
        };
        for record in records {
            // New records carry the highest sequence, so they go after every equal order.
            let at = listeners.partition_point(|existing| {
                self.comparator.compare(existing.order(), record.order()) != CmpOrdering::Greater
            });
            listeners.insert(at, record.clone());
        }

        state.holders.insert(
            id,
            Holder {
                event_type,
                listeners: listeners.into(),
            },
        );
    }

    /// Subscribe `listener` for events of type `E` (and its subtypes).
    ///
    /// Never deduplicates: subscribing the same listener twice yields two
    /// independent records. Fails only when the registry is closed.
    pub fn subscribe<E: Event>(
        &self,
        key: K,
        listener: Listener<E>,
        order: Option<O>,
    ) -> Result<SubscribedListener<K, O>, HeraldError> {
        self.subscribe_erased(key, listener.erase(), order)
    }

    /// Subscribe a type-erased listener.
    pub fn subscribe_erased(
        &self,
        key: K,
        listener: AnyListener,
        order: Option<O>,
    ) -> Result<SubscribedListener<K, O>, HeraldError> {
        let mut state = self.write();
        if state.closed {
            return Err(HeraldError::Closed);
        }
        let record = self.record(key, listener, order);
        self.insert(&mut state, std::slice::from_ref(&record));
        drop(state);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            event_type = %record.event_type(),
            key = ?record.key(),
            order = ?record.order(),
            "listener subscribed"
        );

        Ok(record)
    }

    /// Subscribe many listeners at once, with one snapshot swap per event type.
    ///
    /// Either every listener is subscribed or, if the registry is closed, none.
    /// Records are returned in input order.
    pub fn subscribe_all(
        &self,
        pending: Vec<PendingListener<K, O>>,
    ) -> Result<Vec<SubscribedListener<K, O>>, HeraldError> {
        let mut state = self.write();
        if state.closed {
            return Err(HeraldError::Closed);
        }

        let records: Vec<_> = pending
            .into_iter()
            .map(|p| self.record(p.key, p.listener, p.order))
            .collect();

        let mut grouped: Vec<(TypeId, Vec<SubscribedListener<K, O>>)> = Vec::new();
        for record in &records {
            let id = record.event_type().id();
            match grouped.iter_mut().find(|(group, _)| *group == id) {
                Some((_, group)) => group.push(record.clone()),
                None => grouped.push((id, vec![record.clone()])),
            }
        }
        for (_, group) in &grouped {
            self.insert(&mut state, group);
        }
        drop(state);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            count = records.len(),
            event_types = grouped.len(),
            "listeners subscribed in bulk"
        );

        Ok(records)
    }

    /// Remove exactly `record`. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, record: &SubscribedListener<K, O>) -> bool {
        let removed = self.remove_records(std::slice::from_ref(record)) == 1;

        #[cfg(feature = "tracing")]
        if removed {
            tracing::debug!(
                event_type = %record.event_type(),
                key = ?record.key(),
                "listener unsubscribed"
            );
        }

        removed
    }

    /// Remove every given record. Returns how many were still subscribed.
    pub fn unsubscribe_all(&self, records: &[SubscribedListener<K, O>]) -> usize {
        let removed = self.remove_records(records);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            requested = records.len(),
            removed,
            "listeners unsubscribed"
        );

        removed
    }

    fn remove_records(&self, records: &[SubscribedListener<K, O>]) -> usize {
        if records.is_empty() {
            return 0;
        }
        let mut state = self.write();
        let mut removed = 0;

        for id in distinct_types(records) {
            let Some(holder) = state.holders.get(&id) else {
                continue;
            };
            let before = holder.listeners.len();
            let kept: Vec<_> = holder
                .listeners
                .iter()
                .filter(|existing| !records.iter().any(|r| r.same_as(existing)))
                .cloned()
                .collect();
            if kept.len() != before {
                removed += before - kept.len();
                state.replace(id, kept);
            }
        }
        removed
    }

    /// Remove every record whose key equals `key`, across all event types.
    pub fn unsubscribe_by_key(&self, key: &K) -> Vec<SubscribedListener<K, O>> {
        let removed = self.remove_matching(|record| record.key() == key);

        #[cfg(feature = "tracing")]
        tracing::debug!(key = ?key, removed = removed.len(), "listeners unsubscribed by key");

        removed
    }

    /// Remove every record for which `predicate` holds.
    ///
    /// The predicate runs on a snapshot without any lock held, so it may call
    /// back into the registry. Records subscribed while it runs are kept.
    pub fn unsubscribe_if<P>(&self, predicate: P) -> Vec<SubscribedListener<K, O>>
    where
        P: Fn(&SubscribedListener<K, O>) -> bool,
    {
        let matched: Vec<_> = self
            .all_listeners()
            .into_iter()
            .filter(|record| predicate(record))
            .collect();

        let mut state = self.write();
        let mut removed = Vec::with_capacity(matched.len());
        for id in distinct_types(&matched) {
            let Some(holder) = state.holders.get(&id) else {
                continue;
            };
            let (gone, kept): (Vec<_>, Vec<_>) = holder
                .listeners
                .iter()
                .cloned()
                .partition(|existing| matched.iter().any(|m| m.same_as(existing)));
            if !gone.is_empty() {
                removed.extend(gone);
                state.replace(id, kept);
            }
        }
        drop(state);

        #[cfg(feature = "tracing")]
        tracing::debug!(removed = removed.len(), "listeners unsubscribed by predicate");

        removed
    }

    fn remove_matching<P>(&self, predicate: P) -> Vec<SubscribedListener<K, O>>
    where
        P: Fn(&SubscribedListener<K, O>) -> bool,
    {
        let mut state = self.write();
        let mut removed = Vec::new();
        let ids = state.registration.clone();

        for id in ids {
            let Some(holder) = state.holders.get(&id) else {
                continue;
            };
            if !holder.listeners.iter().any(&predicate) {
                continue;
            }
            let (gone, kept): (Vec<_>, Vec<_>) =
                holder.listeners.iter().cloned().partition(&predicate);
            removed.extend(gone);
            state.replace(id, kept);
        }
        removed
    }

    /// Every listener an event of type `event_type` is dispatched to, in order.
    ///
    /// Includes listeners declared for `event_type` and for each of its
    /// ancestors, merged by order then registration sequence. Never includes
    /// listeners of subtypes or unrelated types.
    pub fn listeners_for(&self, event_type: EventType) -> Vec<SubscribedListener<K, O>> {
        let snapshots: Vec<Snapshot<K, O>> = {
            let state = self.read();
            event_type
                .ancestors()
                .filter_map(|ty| state.holders.get(&ty.id()))
                .map(|holder| Arc::clone(&holder.listeners))
                .collect()
        };

        match snapshots.as_slice() {
            [] => Vec::new(),
            [only] => only.to_vec(),
            _ => {
                let mut merged: Vec<_> = snapshots.iter().flat_map(|s| s.iter().cloned()).collect();
                merged.sort_by(|a, b| self.compare(a, b));
                merged
            }
        }
    }

    /// Every subscription: event types in first-registration order, listeners
    /// of each type in dispatch order.
    pub fn all_listeners(&self) -> Vec<SubscribedListener<K, O>> {
        let state = self.read();
        state
            .registration
            .iter()
            .filter_map(|id| state.holders.get(id))
            .flat_map(|holder| holder.listeners.iter().cloned())
            .collect()
    }

    /// Event types that currently have listeners, in first-registration order.
    pub fn event_types(&self) -> Vec<EventType> {
        let state = self.read();
        state
            .registration
            .iter()
            .filter_map(|id| state.holders.get(id))
            .map(|holder| holder.event_type)
            .collect()
    }

    /// Number of listeners declared exactly for `event_type`.
    pub fn count_for(&self, event_type: EventType) -> usize {
        self.read()
            .holders
            .get(&event_type.id())
            .map_or(0, |holder| holder.listeners.len())
    }

    /// Total number of subscriptions.
    pub fn len(&self) -> usize {
        self.read()
            .holders
            .values()
            .map(|holder| holder.listeners.len())
            .sum()
    }

    /// `true` if nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.read().holders.is_empty()
    }

    /// Remove every subscription. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut state = self.write();
        Self::release(&mut state)
    }

    fn release(state: &mut State<K, O>) -> usize {
        let count = state.holders.values().map(|h| h.listeners.len()).sum();
        state.holders.clear();
        state.registration.clear();
        count
    }

    /// Reject further subscriptions and release every listener.
    ///
    /// Returns how many subscriptions were released; `0` if already closed.
    pub fn close(&self) -> usize {
        let mut state = self.write();
        if state.closed {
            return 0;
        }
        state.closed = true;
        Self::release(&mut state)
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.read().closed
    }
}

impl<K: SubscriptionKey, O: ListenerOrder> fmt::Debug for ListenerRegistry<K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("default_order", &self.default_order)
            .field("event_types", &self.event_types())
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{EventType, Priority};

    struct Base;
    impl Event for Base {}

    struct Derived {
        base: Base,
    }
    impl Event for Derived {
        fn parent(&self) -> Option<&dyn Event> {
            Some(&self.base)
        }
        fn parent_type() -> Option<EventType> {
            Some(EventType::of::<Base>())
        }
    }

    struct Other;
    impl Event for Other {}

    fn registry() -> ListenerRegistry<&'static str, Priority> {
        ListenerRegistry::new(OrderComparator::descending(), Priority::NORMAL)
    }

    fn noop<E: Event>() -> Listener<E> {
        Listener::infallible(|_: &E| {})
    }

    fn keys(records: &[SubscribedListener<&'static str, Priority>]) -> Vec<&'static str> {
        records.iter().map(|r| *r.key()).collect()
    }

    #[test]
    fn listeners_are_sorted_by_priority_then_registration() {
        let registry = registry();
        registry.subscribe("low", noop::<Base>(), Some(Priority::LOW)).unwrap();
        registry.subscribe("normal-1", noop::<Base>(), None).unwrap();
        registry.subscribe("high", noop::<Base>(), Some(Priority::HIGH)).unwrap();
        registry.subscribe("normal-2", noop::<Base>(), None).unwrap();

        let listeners = registry.listeners_for(EventType::of::<Base>());
        assert_eq!(keys(&listeners), vec!["high", "normal-1", "normal-2", "low"]);
    }

    #[test]
    fn hierarchy_lookup_merges_ancestors_only() {
        let registry = registry();
        registry.subscribe("base", noop::<Base>(), Some(Priority::HIGH)).unwrap();
        registry.subscribe("derived", noop::<Derived>(), None).unwrap();
        registry.subscribe("other", noop::<Other>(), Some(Priority::HIGHEST)).unwrap();

        let for_derived = registry.listeners_for(EventType::of::<Derived>());
        assert_eq!(keys(&for_derived), vec!["base", "derived"]);

        let for_base = registry.listeners_for(EventType::of::<Base>());
        assert_eq!(keys(&for_base), vec!["base"]);
    }

    #[test]
    fn duplicate_subscriptions_are_independent() {
        let registry = registry();
        let listener = noop::<Base>();
        let a = registry.subscribe("k", listener.clone(), None).unwrap();
        let b = registry.subscribe("k", listener, None).unwrap();

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert!(registry.unsubscribe(&a));
        assert!(!registry.unsubscribe(&a));
        assert_eq!(registry.all_listeners(), vec![b]);
    }

    #[test]
    fn unsubscribe_by_key_spans_event_types() {
        let registry = registry();
        registry.subscribe("plugin", noop::<Base>(), None).unwrap();
        registry.subscribe("core", noop::<Base>(), None).unwrap();
        registry.subscribe("plugin", noop::<Other>(), None).unwrap();

        let removed = registry.unsubscribe_by_key(&"plugin");
        assert_eq!(removed.len(), 2);
        assert_eq!(keys(&registry.all_listeners()), vec!["core"]);
        assert_eq!(registry.event_types(), vec![EventType::of::<Base>()]);
    }

    #[test]
    fn unsubscribe_if_sees_every_record() {
        let registry = registry();
        registry.subscribe("a", noop::<Base>(), Some(Priority::LOW)).unwrap();
        registry.subscribe("b", noop::<Other>(), Some(Priority::HIGH)).unwrap();
        registry.subscribe("c", noop::<Other>(), Some(Priority::LOW)).unwrap();

        let removed = registry.unsubscribe_if(|record| *record.order() == Priority::LOW);
        assert_eq!(keys(&removed), vec!["a", "c"]);
        assert_eq!(keys(&registry.all_listeners()), vec!["b"]);
    }

    #[test]
    fn bulk_subscribe_and_unsubscribe_all_round_trip() {
        let registry = registry();
        let records = registry
            .subscribe_all(vec![
                PendingListener::new("a", noop::<Base>()),
                PendingListener::new("b", noop::<Other>()).with_order(Priority::HIGH),
                PendingListener::new("c", noop::<Base>()).with_order(Priority::HIGHEST),
            ])
            .unwrap();

        assert_eq!(keys(&records), vec!["a", "b", "c"]);
        assert_eq!(keys(&registry.all_listeners()), vec!["c", "a", "b"]);

        assert_eq!(registry.unsubscribe_all(&records), 3);
        assert!(registry.is_empty());
        assert!(registry.all_listeners().is_empty());
    }

    #[test]
    fn closed_registry_rejects_subscriptions() {
        let registry = registry();
        registry.subscribe("a", noop::<Base>(), None).unwrap();

        assert_eq!(registry.close(), 1);
        assert!(registry.is_closed());
        assert!(registry.is_empty());
        assert!(registry.subscribe("b", noop::<Base>(), None).unwrap_err().is_closed());
        assert!(
            registry
                .subscribe_all(vec![PendingListener::new("c", noop::<Base>())])
                .is_err()
        );
        assert!(registry.is_empty());
        assert_eq!(registry.close(), 0);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_removal() {
        let registry = registry();
        let record = registry.subscribe("a", noop::<Base>(), None).unwrap();

        let snapshot = registry.listeners_for(EventType::of::<Base>());
        registry.unsubscribe(&record);

        assert_eq!(snapshot.len(), 1);
        assert!(registry.listeners_for(EventType::of::<Base>()).is_empty());
    }
}
