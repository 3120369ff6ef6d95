//! # herald-std
//!
//! Standard implementations for the Herald typed event bus.
//!
//! This crate provides:
//! - **Registry**: [`registry::ListenerRegistry`], ordered copy-on-write listener storage
//! - **Dispatch**: [`caller::EventCaller`] (synchronous) and
//!   [`async_caller::AsyncEventCaller`] (executor-backed)
//! - **Observers**: [`observer::ResultObservers`] and [`observer::LoggingObserver`]
//! - **Executors**: inline, thread-per-task and (with the `tokio` feature) tokio
//! - **Testing**: [`testing::OrderRecorder`], [`testing::CountingObserver`]

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core types
pub use herald_core;

// Modules
pub mod async_caller;
pub mod caller;
pub mod executor;
pub mod observer;
pub mod registry;
pub mod testing;
