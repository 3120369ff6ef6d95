//! Event types and the event type hierarchy.
//!
//! Herald resolves listeners by the *type* of a posted event. Types form a
//! hierarchy: a subtype embeds its supertype by value and exposes it through
//! [`Event::parent`], so listeners registered for the supertype also receive
//! every subtype instance.
//!
//! ```rust,ignore
//! struct Connection { peer: String }
//! impl Event for Connection {}
//!
//! struct Handshake { connection: Connection, version: u8 }
//! impl Event for Handshake {
//!     fn parent(&self) -> Option<&dyn Event> { Some(&self.connection) }
//!     fn parent_type() -> Option<EventType> { Some(EventType::of::<Connection>()) }
//! }
//! ```

use std::{
    any::{Any, TypeId},
    fmt,
    hash::{Hash, Hasher},
    sync::atomic::{AtomicBool, Ordering},
};

/// A typed event that can be posted to listeners.
///
/// The two parent declarations must describe the same chain:
/// `parent_type()` is used to resolve listeners, `parent()` to hand the
/// matching part of the instance to them. `#[derive(Event)]` generates both.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not an `Event`",
    label = "missing `Event` implementation",
    note = "Implement `Event` (or derive it) to post or subscribe to `{Self}`."
)]
pub trait Event: EventObject {
    /// The supertype part of this instance, if the type has a parent.
    fn parent(&self) -> Option<&dyn Event> {
        None
    }

    /// Cancellation state of this instance, if the event is cancellable.
    ///
    /// Defaults to the parent's cancellation, so a subtype only overrides it
    /// to declare its own.
    fn cancellation(&self) -> Option<&dyn Cancellable> {
        self.parent().and_then(|parent| parent.cancellation())
    }

    /// The declared parent type.
    fn parent_type() -> Option<EventType>
    where
        Self: Sized,
    {
        None
    }
}

/// Object-safe accessors every [`Event`] gets for free.
///
/// Implemented for all sized events; do not implement it by hand.
pub trait EventObject: Any + Send + Sync {
    /// The instance as `&dyn Any`, for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// The runtime type of the instance.
    fn event_type(&self) -> EventType;
}

impl<T: Event> EventObject for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn event_type(&self) -> EventType {
        EventType::of::<T>()
    }
}

impl dyn Event {
    /// Walks the instance chain (starting at `self`) to the part of type `target`.
    pub fn upcast(&self, target: TypeId) -> Option<&dyn Event> {
        let mut current: Option<&dyn Event> = Some(self);
        while let Some(event) = current {
            if Any::type_id(event.as_any()) == target {
                return Some(event);
            }
            current = event.parent();
        }
        None
    }

    /// Returns the part of type `E`, if `E` is this instance's type or an ancestor.
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.upcast(TypeId::of::<E>())?.as_any().downcast_ref::<E>()
    }

    /// Returns `true` if this event is cancellable and currently cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation().is_some_and(|c| c.is_cancelled())
    }
}

/// Identity of an event type plus the link to its declared parent.
///
/// Equality and hashing only consider the underlying [`TypeId`].
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
    parent: fn() -> Option<EventType>,
}

impl EventType {
    /// The event type of `E`.
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
            parent: E::parent_type,
        }
    }

    /// The [`TypeId`] of the event type.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The Rust type name of the event type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The declared parent type.
    pub fn parent(&self) -> Option<EventType> {
        (self.parent)()
    }

    /// Iterates over this type followed by each of its ancestors.
    pub fn ancestors(&self) -> Ancestors {
        Ancestors { next: Some(*self) }
    }

    /// Returns `true` if `self` is `other` or one of its descendants.
    pub fn is_subtype_of(&self, other: &EventType) -> bool {
        self.ancestors().any(|ty| ty == *other)
    }

    /// Number of ancestors above this type.
    pub fn depth(&self) -> usize {
        self.ancestors().count() - 1
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventType").field(&self.name).finish()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Iterator returned by [`EventType::ancestors`].
#[derive(Debug, Clone)]
pub struct Ancestors {
    next: Option<EventType>,
}

impl Iterator for Ancestors {
    type Item = EventType;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

/// An event whose processing can be cancelled by its listeners.
///
/// Listeners only receive `&E`, so implementations use interior mutability.
pub trait Cancellable: Send + Sync {
    /// Whether the event has been cancelled.
    fn is_cancelled(&self) -> bool;

    /// Sets the cancelled state.
    fn set_cancelled(&self, cancelled: bool);

    /// Marks the event as cancelled.
    fn cancel(&self) {
        self.set_cancelled(true);
    }
}

/// A thread-safe cancellation flag to embed in cancellable events.
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    /// Create a flag in the given state.
    pub const fn new(cancelled: bool) -> Self {
        Self(AtomicBool::new(cancelled))
    }
}

impl Clone for CancelFlag {
    fn clone(&self) -> Self {
        Self::new(self.is_cancelled())
    }
}

impl Cancellable for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set_cancelled(&self, cancelled: bool) {
        self.0.store(cancelled, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Base {
        flag: CancelFlag,
    }

    impl Event for Base {
        fn cancellation(&self) -> Option<&dyn Cancellable> {
            Some(&self.flag)
        }
    }

    #[derive(Debug)]
    struct Middle {
        base: Base,
    }

    impl Event for Middle {
        fn parent(&self) -> Option<&dyn Event> {
            Some(&self.base)
        }

        fn parent_type() -> Option<EventType> {
            Some(EventType::of::<Base>())
        }
    }

    #[derive(Debug)]
    struct Leaf {
        middle: Middle,
        id: u32,
    }

    impl Event for Leaf {
        fn parent(&self) -> Option<&dyn Event> {
            Some(&self.middle)
        }

        fn parent_type() -> Option<EventType> {
            Some(EventType::of::<Middle>())
        }
    }

    struct Unrelated;
    impl Event for Unrelated {}

    fn leaf() -> Leaf {
        Leaf {
            middle: Middle {
                base: Base {
                    flag: CancelFlag::default(),
                },
            },
            id: 7,
        }
    }

    #[test]
    fn ancestors_walk_up_to_the_root() {
        let names: Vec<_> = EventType::of::<Leaf>().ancestors().collect();
        assert_eq!(
            names,
            vec![
                EventType::of::<Leaf>(),
                EventType::of::<Middle>(),
                EventType::of::<Base>()
            ]
        );
        assert_eq!(EventType::of::<Leaf>().depth(), 2);
        assert_eq!(EventType::of::<Base>().depth(), 0);
    }

    #[test]
    fn subtype_relation_is_reflexive_and_directed() {
        let leaf = EventType::of::<Leaf>();
        let base = EventType::of::<Base>();

        assert!(leaf.is_subtype_of(&leaf));
        assert!(leaf.is_subtype_of(&base));
        assert!(!base.is_subtype_of(&leaf));
        assert!(!leaf.is_subtype_of(&EventType::of::<Unrelated>()));
    }

    #[test]
    fn dyn_event_downcasts_to_ancestors() {
        let event = leaf();
        let dyn_event: &dyn Event = &event;

        assert_eq!(dyn_event.event_type(), EventType::of::<Leaf>());
        assert_eq!(dyn_event.downcast_ref::<Leaf>().map(|l| l.id), Some(7));
        assert!(dyn_event.downcast_ref::<Middle>().is_some());
        assert!(dyn_event.downcast_ref::<Base>().is_some());
        assert!(dyn_event.downcast_ref::<Unrelated>().is_none());
    }

    #[test]
    fn cancellation_is_inherited_through_parents() {
        let event = leaf();
        let dyn_event: &dyn Event = &event;
        let middle: &dyn Event = &event.middle;

        assert!(dyn_event.cancellation().is_some());
        assert!(!dyn_event.is_cancelled());
        assert!(!middle.is_cancelled());

        event.middle.base.flag.cancel();
        assert!(dyn_event.is_cancelled());
        assert!(middle.is_cancelled());

        dyn_event.cancellation().unwrap().set_cancelled(false);
        assert!(!event.middle.base.flag.is_cancelled());
    }

    #[test]
    fn events_without_cancellable_ancestors_are_not_cancellable() {
        let event = Unrelated;
        let dyn_event: &dyn Event = &event;
        assert!(dyn_event.cancellation().is_none());
        assert!(!dyn_event.is_cancelled());
    }

    #[test]
    fn cancel_flag_clone_copies_state() {
        let flag = CancelFlag::new(true);
        let copy = flag.clone();
        flag.set_cancelled(false);
        assert!(copy.is_cancelled());
        assert!(!flag.is_cancelled());
    }
}
