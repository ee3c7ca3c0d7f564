//! Lookup caches.
//!
//! Every cache is a [`KeyedCache`]: a concurrent map plus one gate per key
//! under construction. Concurrent callers for the same key wait on its gate
//! and observe the value the first caller created; callers for other keys
//! are not blocked. Failures are never cached. Entries are never evicted.

mod constructor;
mod type_cache;

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxBuildHasher;

pub use constructor::{ConstructorCallCache, ConstructorForAssembledTypeCache};
pub use type_cache::TypeCache;

/// Concurrent map with at-most-one creation per key.
///
/// A thread must not request a key from inside that key's own creation; it
/// would wait on its own gate.
pub struct KeyedCache<K, V> {
    values: DashMap<K, V, FxBuildHasher>,
    gates: DashMap<K, Arc<Mutex<()>>, FxBuildHasher>,
}

impl<K: Eq + Hash + Clone, V: Clone> KeyedCache<K, V> {
    pub fn new() -> Self {
        KeyedCache {
            values: DashMap::with_hasher(FxBuildHasher),
            gates: DashMap::with_hasher(FxBuildHasher),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    /// Insert `value` unless `key` is present; returns the cached value.
    pub fn insert_if_absent(&self, key: K, value: V) -> V {
        self.values.entry(key).or_insert(value).value().clone()
    }

    /// The value under `key`, creating it with `create` if absent.
    ///
    /// No map lock is held while `create` runs.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &K,
        create: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let gate = Arc::clone(self.gates.entry(key.clone()).or_default().value());
        let _creating = gate.lock();
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        // After a failure the gate stays, so retries stay serialized.
        let value = self.insert_if_absent(key.clone(), create()?);
        self.gates.remove(key);
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for KeyedCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> fmt::Debug for KeyedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedCache")
            .field("entries", &self.values.len())
            .field("in_progress", &self.gates.len())
            .finish()
    }
}
