//! # herald-core
//!
//! Core types and traits for the Herald typed event bus.
//!
//! This crate has minimal dependencies and is meant to be imported by code
//! that declares events and listeners without needing the dispatch engine in
//! `herald-std`.
//!
//! # Building blocks
//!
//! - [`Event`]: a posted value. Event types form a hierarchy through
//!   [`Event::parent`], and listeners of a supertype receive subtype instances.
//! - [`Listener`]: a handler for one event type, optionally with its own
//!   exception hook. Type-erased into an [`AnyListener`] for storage.
//! - [`SubscribedListener`]: a listener bound into a registry under a key and
//!   an order value. Equality is identity.
//! - [`OrderComparator`] and [`Priority`]: how listeners are ordered.
//! - [`Key`]: the stock subscription key, a name with an optional namespace.
//! - [`ExceptionHandler`] and [`ExceptionPolicy`]: what happens after a listener fails.
//! - [`PostResult`] and [`PostOutcome`]: what a post reports back.
//! - [`Executor`]: where asynchronous posts run.
//!
//! # Error Types
//!
//! - [`HeraldError`] - Top-level error type
//! - [`DispatchError`] - Errors that abort or prevent a dispatch
//! - [`ListenerError`] - Errors raised by a listener

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod error;
mod event;
mod exception;
mod executor;
mod key;
mod listener;
mod order;
mod result;
mod subscription;

// Re-exports
pub use error::{
    BoxError, ConfigError, DispatchError, ExecutorError, HeraldError, KeyError, ListenerError,
    panic_message,
};
pub use event::{Ancestors, CancelFlag, Cancellable, Event, EventObject, EventType};
pub use exception::{ExceptionHandler, ExceptionPolicy, HandlerAction};
pub use executor::{Executor, Task};
pub use key::{Key, SubscriptionKey};
pub use listener::{AnyListener, Listener};
pub use order::{ListenerOrder, OrderComparator, Priority};
pub use result::{DispatchState, Failure, PostOutcome, PostReport, PostResult, StopReason};
pub use subscription::SubscribedListener;
