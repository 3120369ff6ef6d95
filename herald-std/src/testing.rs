//! Testing utilities for Herald.
//!
//! This module provides helpers to make testing dispatch order, exception
//! policies and observers easier.
//!
//! # Features
//!
//! - [`OrderRecorder`]: Builds listeners that record their label when invoked
//! - [`CountingObserver`]: A result observer that counts posts and failures

use herald_core::{Event, Listener, PostReport};
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use crate::observer::ResultObserver;

// ============================================================================
// Order Recorder
// ============================================================================

/// Records the labels of invoked listeners, in invocation order.
///
/// All listeners built from one recorder (and its clones) share the log.
///
/// # Example
///
/// ```rust,ignore
/// let recorder = OrderRecorder::new();
/// service.subscribe_listener(key, recorder.listener::<Ping>("x"), Some(Priority::HIGH))?;
/// service.subscribe_listener(key, recorder.listener::<Ping>("y"), Some(Priority::LOW))?;
///
/// service.post(Ping)?;
/// assert_eq!(recorder.order(), vec!["x", "y"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct OrderRecorder {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl OrderRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `label` to the log.
    pub fn record(&self, label: &'static str) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(label);
    }

    /// The labels recorded so far.
    pub fn order(&self) -> Vec<&'static str> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Take the labels recorded so far, leaving the log empty.
    pub fn take(&self) -> Vec<&'static str> {
        std::mem::take(&mut *self.calls.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// A listener that records `label` and succeeds.
    pub fn listener<E: Event>(&self, label: &'static str) -> Listener<E> {
        let recorder = self.clone();
        Listener::infallible(move |_: &E| recorder.record(label))
    }

    /// A listener that records `label` and fails with `message`.
    pub fn failing<E: Event>(&self, label: &'static str, message: &'static str) -> Listener<E> {
        let recorder = self.clone();
        Listener::new(move |_: &E| {
            recorder.record(label);
            Err(message.into())
        })
    }

    /// A listener that records `label` and panics with `message`.
    pub fn panicking<E: Event>(&self, label: &'static str, message: &'static str) -> Listener<E> {
        let recorder = self.clone();
        Listener::infallible(move |_: &E| {
            recorder.record(label);
            panic!("{}", message);
        })
    }
}

// ============================================================================
// Counting Observer
// ============================================================================

/// A result observer that counts completed and failed posts.
///
/// Clones share their counters, so keep one clone to inspect after
/// registering the other.
#[derive(Debug, Clone, Default)]
pub struct CountingObserver {
    posts: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
}

impl CountingObserver {
    /// Create an observer with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of posts observed.
    pub fn posts(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }

    /// Number of observed posts with at least one listener failure.
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

impl<K: 'static, O: 'static> ResultObserver<K, O> for CountingObserver {
    fn on_result(&self, report: &PostReport<'_, K, O>) {
        self.posts.fetch_add(1, Ordering::SeqCst);
        if report.outcome().is_failure() {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
