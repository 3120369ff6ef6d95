//! # herald - In-Process Typed Event Bus
//!
//! `herald` dispatches typed events to listeners registered by event type.
//! Event types form a hierarchy: a listener for a supertype receives every
//! subtype event as well. Listeners run in a deterministic order (by their
//! order value, then by registration), failures are handled per listener or
//! by a service-wide policy, and posts can run synchronously or on an
//! executor.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! struct Ping { seq: u32 }
//! impl Event for Ping {}
//!
//! let service = EventService::builder().priority_order().build()?;
//!
//! service.subscribe_with(Key::new("first")?, Priority::HIGH, |ping: &Ping| {
//!     println!("first saw {}", ping.seq);
//!     Ok(())
//! })?;
//! service.subscribe(Key::new("second")?, |_: &Ping| Ok(()))?;
//!
//! let result = service.post(Ping { seq: 1 })?;
//! assert!(result.is_success());
//! ```
//!
//! ## Event hierarchies
//!
//! A subtype embeds its supertype and declares it as parent. With the
//! `macros` feature, `#[derive(Event)]` writes the boilerplate:
//!
//! ```rust,ignore
//! #[derive(Event)]
//! struct Connection {
//!     #[event(cancel)]
//!     cancelled: CancelFlag,
//! }
//!
//! #[derive(Event)]
//! struct Handshake {
//!     #[event(parent)]
//!     connection: Connection,
//! }
//! ```
//!
//! ## Features
//!
//! - `tracing` (default): structured logs through `tracing`
//! - `macros`: `#[derive(Event)]`
//! - `tokio`: [`executor::TokioExecutor`]

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod builder;
mod service;
mod subscriber;

pub use builder::EventServiceBuilder;
pub use service::EventService;
pub use subscriber::{BulkSubscriber, ChannelInfo, TypedSubscriber};

pub use herald_core::{
    Ancestors, AnyListener, BoxError, CancelFlag, Cancellable, ConfigError, DispatchError,
    DispatchState, Event, EventObject, EventType, ExceptionHandler, ExceptionPolicy,
    ExecutorError, Executor, Failure, HandlerAction, HeraldError, Key, KeyError, Listener,
    ListenerError, ListenerOrder, OrderComparator, PostOutcome, PostReport, PostResult, Priority,
    StopReason, SubscribedListener, SubscriptionKey, Task,
};

pub use herald_std::{
    async_caller::{AsyncEventCaller, DeferredPost, PostHandle},
    caller::{CancelPolicy, EventCaller, InFlight},
    observer::{LoggingObserver, ObserverId, ResultObserver, ResultObservers},
    registry::{ListenerRegistry, PendingListener},
};

#[cfg(feature = "macros")]
pub use herald_macros::Event;

/// Stock executors for asynchronous posting.
pub mod executor {
    #[cfg(feature = "tokio")]
    pub use herald_std::executor::TokioExecutor;
    pub use herald_std::executor::{InlineExecutor, ThreadExecutor};
}

/// Testing utilities.
pub mod testing {
    pub use herald_std::testing::{CountingObserver, OrderRecorder};
}

/// Prelude module - common imports for Herald.
///
/// # Usage
///
/// ```rust,ignore
/// use herald::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BoxError, CancelFlag, CancelPolicy, Cancellable, Event, EventObject, EventService,
        EventType, ExceptionPolicy, HandlerAction, HeraldError, Key, Listener, PostResult,
        Priority, SubscribedListener,
    };
}
