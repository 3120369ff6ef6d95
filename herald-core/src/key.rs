//! Subscription keys.
//!
//! A key groups subscriptions so they can be removed together, for example
//! "every listener registered by plugin X". Keys are never used for ordering.

use crate::error::KeyError;
use std::{fmt, hash::Hash, str::FromStr, sync::Arc};

/// Bounds required of a key type used by a registry.
pub trait SubscriptionKey: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> SubscriptionKey for T where T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

/// The stock key: a name with an optional namespace.
///
/// Two keys are equal iff both name and namespace match.
///
/// # Example
///
/// ```rust,ignore
/// let key: Key = "metrics:flush".parse()?;
/// assert_eq!(key.namespace(), Some("metrics"));
/// assert_eq!(key.name(), "flush");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    namespace: Option<Arc<str>>,
    name: Arc<str>,
}

impl Key {
    /// Create a key without namespace.
    ///
    /// The name must not contain `:`, which would read back as a namespace.
    pub fn new(name: impl AsRef<str>) -> Result<Self, KeyError> {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(KeyError::EmptyName);
        }
        if name.contains(':') {
            return Err(KeyError::InvalidName);
        }
        Ok(Self {
            namespace: None,
            name: Arc::from(name),
        })
    }

    /// Create a key inside `namespace`.
    pub fn namespaced(namespace: impl AsRef<str>, name: impl AsRef<str>) -> Result<Self, KeyError> {
        let namespace = namespace.as_ref();
        if namespace.is_empty() {
            return Err(KeyError::EmptyNamespace);
        }
        if namespace.contains(':') {
            return Err(KeyError::InvalidNamespace);
        }
        let name = name.as_ref();
        if name.is_empty() {
            return Err(KeyError::EmptyName);
        }
        Ok(Self {
            namespace: Some(Arc::from(namespace)),
            name: Arc::from(name),
        })
    }

    /// The key name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key namespace.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}:{}", namespace, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self)
    }
}

impl FromStr for Key {
    type Err = KeyError;

    /// Parses `"name"` or `"namespace:name"`; the first `:` separates the two.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((namespace, name)) => Self::namespaced(namespace, name),
            None => Self::new(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_compare_by_name_and_namespace() {
        let a = Key::new("audit").unwrap();
        let b = Key::new("audit").unwrap();
        let c = Key::namespaced("plugin", "audit").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(c, Key::namespaced("plugin", "audit").unwrap());
        assert_ne!(c, Key::namespaced("other", "audit").unwrap());
    }

    #[test]
    fn empty_parts_are_rejected() {
        assert_eq!(Key::new(""), Err(KeyError::EmptyName));
        assert_eq!(Key::namespaced("", "x"), Err(KeyError::EmptyNamespace));
        assert_eq!(Key::namespaced("ns", ""), Err(KeyError::EmptyName));
        assert_eq!(Key::namespaced("a:b", "x"), Err(KeyError::InvalidNamespace));
    }

    #[test]
    fn parse_and_display() {
        let key: Key = "metrics:flush".parse().unwrap();
        assert_eq!(key.namespace(), Some("metrics"));
        assert_eq!(key.name(), "flush");
        assert_eq!(key.to_string(), "metrics:flush");
        assert_eq!(format!("{:?}", key), "Key(metrics:flush)");

        let plain: Key = "flush".parse().unwrap();
        assert_eq!(plain.namespace(), None);
        assert_eq!(plain.to_string(), "flush");

        assert_eq!(":flush".parse::<Key>(), Err(KeyError::EmptyNamespace));
    }

    #[test]
    fn display_parses_back_to_the_same_key() {
        assert_eq!(Key::new("a:b"), Err(KeyError::InvalidName));

        let nested = Key::namespaced("a", "b:c").unwrap();
        assert_eq!(nested.to_string(), "a:b:c");

        for key in [nested, Key::new("flush").unwrap(), Key::namespaced("m", "f").unwrap()] {
            assert_eq!(key.to_string().parse::<Key>(), Ok(key));
        }
    }
}
