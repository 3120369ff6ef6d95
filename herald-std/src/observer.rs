//! Result observers.
//!
//! Observers see every completed post, sync or async, including posts whose
//! failure was rethrown. They run after dispatch finished and with no lock
//! held, so an observer may itself subscribe, unsubscribe or post.

use herald_core::{PostReport, panic_message};
use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

/// Receives a [`PostReport`] for every completed post.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `ResultObserver<{K}, {O}>`",
    note = "Closures must accept `&PostReport<'_, K, O>`."
)]
pub trait ResultObserver<K, O>: Send + Sync + 'static {
    /// Called once per completed post.
    fn on_result(&self, report: &PostReport<'_, K, O>);
}

impl<K, O, F> ResultObserver<K, O> for F
where
    F: Fn(&PostReport<'_, K, O>) + Send + Sync + 'static,
{
    fn on_result(&self, report: &PostReport<'_, K, O>) {
        self(report)
    }
}

/// Handle returned by [`ResultObservers::add`], used to remove the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

type Entry<K, O> = (ObserverId, Arc<dyn ResultObserver<K, O>>);

/// A set of result observers shared by a caller and its service.
pub struct ResultObservers<K, O> {
    next_id: AtomicU64,
    entries: RwLock<Vec<Entry<K, O>>>,
}

impl<K: 'static, O: 'static> ResultObservers<K, O> {
    /// An empty set.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Register a closure observer.
    pub fn add<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&PostReport<'_, K, O>) + Send + Sync + 'static,
    {
        self.add_observer(observer)
    }

    /// Register any [`ResultObserver`].
    pub fn add_observer<R: ResultObserver<K, O>>(&self, observer: R) -> ObserverId {
        self.add_shared(Arc::new(observer))
    }

    /// Register an observer that is already shared.
    pub fn add_shared(&self, observer: Arc<dyn ResultObserver<K, O>>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));
        id
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn remove(&self, id: ObserverId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// `true` if no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every observer.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Hand `report` to every observer registered at the time of the call.
    ///
    /// Observer panics are caught and logged; the remaining observers still run.
    pub fn notify(&self, report: &PostReport<'_, K, O>) {
        let snapshot: Vec<Arc<dyn ResultObserver<K, O>>> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in snapshot {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| observer.on_result(report))) {
                let message = panic_message(&*payload);
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    event_type = %report.event().event_type(),
                    panic = %message,
                    "result observer panicked"
                );
                #[cfg(not(feature = "tracing"))]
                let _ = message;
            }
        }
    }
}

impl<K: 'static, O: 'static> Default for ResultObservers<K, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: 'static, O: 'static> fmt::Debug for ResultObservers<K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultObservers")
            .field("len", &self.len())
            .finish()
    }
}

/// Logs every post: failed ones at `warn`, successful ones at `trace`.
///
/// A no-op when the `tracing` feature is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl<K: fmt::Debug + 'static, O: fmt::Debug + 'static> ResultObserver<K, O> for LoggingObserver {
    fn on_result(&self, report: &PostReport<'_, K, O>) {
        #[cfg(feature = "tracing")]
        {
            let outcome = report.outcome();
            if outcome.is_failure() {
                for failure in outcome.failures() {
                    tracing::warn!(
                        event_type = %outcome.event_type(),
                        listener = %failure.listener().event_type(),
                        key = ?failure.listener().key(),
                        error = %failure.error(),
                        "listener failed"
                    );
                }
                tracing::warn!(
                    event_type = %outcome.event_type(),
                    failures = outcome.failures().len(),
                    invoked = outcome.invoked(),
                    stop_reason = ?outcome.stop_reason(),
                    "post completed with failures"
                );
            } else {
                tracing::trace!(
                    event_type = %outcome.event_type(),
                    invoked = outcome.invoked(),
                    stop_reason = ?outcome.stop_reason(),
                    "post completed"
                );
            }
        }
        #[cfg(not(feature = "tracing"))]
        {
            let _ = report;
        }
    }
}
