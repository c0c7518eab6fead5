//! Thread-safe data bags carried by a request context.

use parking_lot::RwLock;
use std::collections::HashMap;

/// A thread-safe, general-purpose metadata map.
///
/// Writes overwrite. Middleware that must not collide on key names should
/// use the [`ScopedBag`] instead.
#[derive(Debug, Default)]
pub struct MetadataBag {
    data: RwLock<HashMap<String, serde_json::Value>>,
}

impl MetadataBag {
    /// Creates a new empty metadata bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a value from the bag.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.data.read().get(key).cloned()
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Sets a value, overwriting any existing entry.
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.data.write().insert(key.into(), value);
    }

    /// Removes a key, returning its value if present.
    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.data.write().remove(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    /// Returns a copy of all data.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        self.data.read().clone()
    }
}

impl Clone for MetadataBag {
    fn clone(&self) -> Self {
        Self {
            data: RwLock::new(self.data.read().clone()),
        }
    }
}

/// A thread-safe store keyed by `(middleware_name, key)`.
///
/// Each middleware writes under its own namespace, so unrelated middleware
/// cannot collide on key names.
#[derive(Debug, Default)]
pub struct ScopedBag {
    data: RwLock<HashMap<String, HashMap<String, serde_json::Value>>>,
}

impl ScopedBag {
    /// Creates a new empty scoped bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a value from a middleware's namespace.
    #[must_use]
    pub fn get(&self, middleware: &str, key: &str) -> Option<serde_json::Value> {
        self.data
            .read()
            .get(middleware)
            .and_then(|ns| ns.get(key))
            .cloned()
    }

    /// Sets a value in a middleware's namespace, overwriting any existing entry.
    pub fn set(
        &self,
        middleware: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
    ) {
        self.data
            .write()
            .entry(middleware.into())
            .or_default()
            .insert(key.into(), value);
    }

    /// Checks if a key exists in a middleware's namespace.
    #[must_use]
    pub fn contains(&self, middleware: &str, key: &str) -> bool {
        self.data
            .read()
            .get(middleware)
            .is_some_and(|ns| ns.contains_key(key))
    }

    /// Returns a copy of one middleware's namespace.
    #[must_use]
    pub fn namespace(&self, middleware: &str) -> HashMap<String, serde_json::Value> {
        self.data.read().get(middleware).cloned().unwrap_or_default()
    }

    /// Returns the total number of entries across all namespaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().values().map(HashMap::len).sum()
    }

    /// Returns true if no namespace holds any entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of all namespaces.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, HashMap<String, serde_json::Value>> {
        self.data.read().clone()
    }
}

impl Clone for ScopedBag {
    fn clone(&self) -> Self {
        Self {
            data: RwLock::new(self.data.read().clone()),
        }
    }
}
