//! Listener ordering.
//!
//! Every subscription carries an order value. Registries sort subscriptions
//! with an injected [`OrderComparator`]; ties fall back to registration order.
//! [`Priority`] is the stock order type.

use std::{cmp::Ordering, fmt, sync::Arc};

/// Bounds required of an order type used by a registry.
pub trait ListenerOrder: Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> ListenerOrder for T where T: Clone + fmt::Debug + Send + Sync + 'static {}

/// An integer priority with named bands.
///
/// With [`OrderComparator::descending`] (the default for priorities), higher
/// priorities are invoked first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Priority(i32);

impl Priority {
    /// Value of [`Priority::LOWEST`].
    pub const LOWEST_VALUE: i32 = -128;
    /// Value of [`Priority::LOW`].
    pub const LOW_VALUE: i32 = -64;
    /// Value of [`Priority::NORMAL`].
    pub const NORMAL_VALUE: i32 = 0;
    /// Value of [`Priority::HIGH`].
    pub const HIGH_VALUE: i32 = 64;
    /// Value of [`Priority::HIGHEST`].
    pub const HIGHEST_VALUE: i32 = 128;

    /// Lowest named band.
    pub const LOWEST: Priority = Priority(Self::LOWEST_VALUE);
    /// Low band.
    pub const LOW: Priority = Priority(Self::LOW_VALUE);
    /// Default band.
    pub const NORMAL: Priority = Priority(Self::NORMAL_VALUE);
    /// High band.
    pub const HIGH: Priority = Priority(Self::HIGH_VALUE);
    /// Highest named band.
    pub const HIGHEST: Priority = Priority(Self::HIGHEST_VALUE);

    /// A priority with an arbitrary value.
    pub const fn value(value: i32) -> Self {
        Priority(value)
    }

    /// The numeric value.
    pub const fn get(self) -> i32 {
        self.0
    }

    /// The named band this priority falls on exactly, if any.
    pub fn band(self) -> Option<&'static str> {
        match self.0 {
            Self::LOWEST_VALUE => Some("LOWEST"),
            Self::LOW_VALUE => Some("LOW"),
            Self::NORMAL_VALUE => Some("NORMAL"),
            Self::HIGH_VALUE => Some("HIGH"),
            Self::HIGHEST_VALUE => Some("HIGHEST"),
            _ => None,
        }
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Priority(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.band() {
            Some(band) => f.write_str(band),
            None => write!(f, "{}", self.0),
        }
    }
}

/// A shareable comparison function over order values.
///
/// `Less` means "invoked earlier".
pub struct OrderComparator<O> {
    compare: Arc<dyn Fn(&O, &O) -> Ordering + Send + Sync>,
}

impl<O: 'static> OrderComparator<O> {
    /// Wrap a comparison function.
    pub fn new<F>(compare: F) -> Self
    where
        F: Fn(&O, &O) -> Ordering + Send + Sync + 'static,
    {
        Self {
            compare: Arc::new(compare),
        }
    }

    /// Ascending order: smaller values are invoked first.
    pub fn natural() -> Self
    where
        O: Ord,
    {
        Self::new(|a: &O, b: &O| a.cmp(b))
    }

    /// Descending order: larger values are invoked first.
    pub fn descending() -> Self
    where
        O: Ord,
    {
        Self::new(|a: &O, b: &O| b.cmp(a))
    }

    /// Compare two order values.
    pub fn compare(&self, a: &O, b: &O) -> Ordering {
        (self.compare)(a, b)
    }

    /// The same comparator with its result reversed.
    pub fn reversed(self) -> Self {
        let inner = self.compare;
        Self {
            compare: Arc::new(move |a: &O, b: &O| inner(a, b).reverse()),
        }
    }
}

impl<O> Clone for OrderComparator<O> {
    fn clone(&self) -> Self {
        Self {
            compare: Arc::clone(&self.compare),
        }
    }
}

impl<O> fmt::Debug for OrderComparator<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderComparator").finish_non_exhaustive()
    }
}
