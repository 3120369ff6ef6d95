//! Configuration of an [`EventService`].

use crate::service::EventService;
use herald_core::{
    ConfigError, ExceptionHandler, ExceptionPolicy, Executor, ListenerOrder, OrderComparator,
    PostReport, Priority, SubscriptionKey,
};
use herald_std::{
    async_caller::AsyncEventCaller,
    caller::{CancelPolicy, EventCaller},
    observer::{ResultObserver, ResultObservers},
    registry::ListenerRegistry,
};
use std::{fmt, sync::Arc};

/// Builder for [`EventService`].
///
/// Start from [`EventService::builder`]. An order is mandatory; everything
/// else has a default: the `Continue` exception policy, cancellation ignored,
/// no default executor and no observers.
///
/// The methods that change the key or order type ([`key_type`](Self::key_type),
/// [`priority_order`](Self::priority_order), [`natural_order`](Self::natural_order)
/// and [`order_comparator`](Self::order_comparator)) keep built-in exception
/// policies, the cancel policy and the executor, but drop a custom exception
/// handler and any result observer, since those are typed over the old
/// parameters. Choose the types first.
///
/// # Example
///
/// ```rust,ignore
/// let service = EventService::builder()
///     .priority_order()
///     .exception_policy(ExceptionPolicy::Break)
///     .cancel_policy(CancelPolicy::StopOnCancel)
///     .executor(ThreadExecutor::named("events"))
///     .observer(LoggingObserver)
///     .build()?;
/// ```
pub struct EventServiceBuilder<K, O> {
    order: Option<(OrderComparator<O>, O)>,
    exception_policy: ExceptionPolicy<K, O>,
    cancel_policy: CancelPolicy,
    executor: Option<Arc<dyn Executor>>,
    observers: Vec<Arc<dyn ResultObserver<K, O>>>,
}

impl EventServiceBuilder<herald_core::Key, Priority> {
    pub(crate) fn new() -> Self {
        Self {
            order: None,
            exception_policy: ExceptionPolicy::default(),
            cancel_policy: CancelPolicy::default(),
            executor: None,
            observers: Vec::new(),
        }
    }
}

impl<K: SubscriptionKey, O: ListenerOrder> EventServiceBuilder<K, O> {
    fn retype<K2, O2>(self, order: Option<(OrderComparator<O2>, O2)>) -> EventServiceBuilder<K2, O2> {
        let exception_policy = match self.exception_policy {
            ExceptionPolicy::Continue => ExceptionPolicy::Continue,
            ExceptionPolicy::Break => ExceptionPolicy::Break,
            ExceptionPolicy::Rethrow => ExceptionPolicy::Rethrow,
            ExceptionPolicy::Custom(_) => ExceptionPolicy::default(),
        };
        EventServiceBuilder {
            order,
            exception_policy,
            cancel_policy: self.cancel_policy,
            executor: self.executor,
            observers: Vec::new(),
        }
    }

    /// Use `K2` as the subscription key type.
    pub fn key_type<K2: SubscriptionKey>(self) -> EventServiceBuilder<K2, O> {
        let order = self.order.clone();
        self.retype(order)
    }

    /// Order by [`Priority`], highest first, with [`Priority::NORMAL`] as default.
    pub fn priority_order(self) -> EventServiceBuilder<K, Priority> {
        self.retype(Some((OrderComparator::descending(), Priority::NORMAL)))
    }

    /// Order by `O2` ascending, with `default` for subscriptions that give none.
    pub fn natural_order<O2: ListenerOrder + Ord>(self, default: O2) -> EventServiceBuilder<K, O2> {
        self.retype(Some((OrderComparator::natural(), default)))
    }

    /// Order by `comparator`, with `default` for subscriptions that give none.
    pub fn order_comparator<O2: ListenerOrder>(
        self,
        comparator: OrderComparator<O2>,
        default: O2,
    ) -> EventServiceBuilder<K, O2> {
        self.retype(Some((comparator, default)))
    }

    /// Exception policy for listeners without their own hook.
    pub fn exception_policy(mut self, policy: ExceptionPolicy<K, O>) -> Self {
        self.exception_policy = policy;
        self
    }

    /// Use a custom exception handler for listeners without their own hook.
    pub fn exception_handler<H: ExceptionHandler<K, O>>(self, handler: H) -> Self {
        self.exception_policy(ExceptionPolicy::custom(handler))
    }

    /// How dispatch reacts to cancelled events.
    pub fn cancel_policy(mut self, policy: CancelPolicy) -> Self {
        self.cancel_policy = policy;
        self
    }

    /// Default executor for [`EventService::post_async`].
    pub fn executor<X: Executor>(mut self, executor: X) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    /// Observe every post from creation on.
    pub fn result_observer<F>(self, observer: F) -> Self
    where
        F: Fn(&PostReport<'_, K, O>) + Send + Sync + 'static,
    {
        self.observer(observer)
    }

    /// Register any [`ResultObserver`] from creation on.
    pub fn observer<R: ResultObserver<K, O>>(mut self, observer: R) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    /// Build the service.
    ///
    /// Fails with [`ConfigError::MissingOrder`] if no order was chosen.
    pub fn build(self) -> Result<EventService<K, O>, ConfigError> {
        let (comparator, default_order) = self.order.ok_or(ConfigError::MissingOrder)?;

        let registry = Arc::new(ListenerRegistry::new(comparator, default_order));
        let observers = Arc::new(ResultObservers::new());
        for observer in self.observers {
            observers.add_shared(observer);
        }

        let caller = Arc::new(
            EventCaller::new(Arc::clone(&registry))
                .with_exception_policy(self.exception_policy)
                .with_cancel_policy(self.cancel_policy)
                .with_observers(observers),
        );
        let mut async_caller = AsyncEventCaller::new(Arc::clone(&caller));
        if let Some(executor) = self.executor {
            async_caller = async_caller.with_executor(executor);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            default_order = ?registry.default_order(),
            exception_policy = ?caller.exception_policy(),
            cancel_policy = ?caller.cancel_policy(),
            executor = async_caller.executor().is_some(),
            "event service built"
        );

        Ok(EventService::from_parts(registry, caller, async_caller))
    }
}

impl<K, O: fmt::Debug> fmt::Debug for EventServiceBuilder<K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventServiceBuilder")
            .field("default_order", &self.order.as_ref().map(|(_, default)| default))
            .field("exception_policy", &self.exception_policy)
            .field("cancel_policy", &self.cancel_policy)
            .field("executor", &self.executor.is_some())
            .field("observers", &self.observers.len())
            .finish()
    }
}
