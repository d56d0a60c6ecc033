//! # Result Cache
//!
//! Keyed store with an eviction hook. The dataflow engine keeps one in-flight or
//! resolved [`Cancellable`](crate::Cancellable) per node here and cancels it from the
//! hook when the entry is deleted or the cache is cleared.
//!
//! The eviction hook always runs after the entry has left the map and outside the
//! internal lock, so it may call back into the cache.

use crate::error::CacheError;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Callback invoked with every value removed by `delete` or `clear`.
pub type EvictionHook<V> = Arc<dyn Fn(&V) + Send + Sync>;

/// Keyed cache with add-once semantics and an eviction hook.
pub struct Cache<K, V> {
  entries: Mutex<HashMap<K, V>>,
  on_evict: Option<EvictionHook<V>>,
}

impl<K, V> Cache<K, V>
where
  K: Eq + Hash,
  V: Clone,
{
  /// Creates a cache without an eviction hook.
  pub fn new() -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      on_evict: None,
    }
  }

  /// Creates a cache that calls `on_evict` with every removed value.
  pub fn with_eviction(on_evict: impl Fn(&V) + Send + Sync + 'static) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      on_evict: Some(Arc::new(on_evict)),
    }
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<K, V>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Returns a clone of the value stored under `key`.
  pub fn get(&self, key: &K) -> Option<V> {
    self.entries().get(key).cloned()
  }

  /// Stores `value` under `key`.
  ///
  /// # Errors
  ///
  /// Returns [`CacheError::AlreadyExists`] if `key` is present; the stored value is
  /// not replaced.
  pub fn add(&self, key: K, value: V) -> Result<(), CacheError> {
    let mut entries = self.entries();
    if entries.contains_key(&key) {
      return Err(CacheError::AlreadyExists);
    }
    entries.insert(key, value);
    Ok(())
  }

  /// Returns the value under `key`, creating and storing it with `make` if absent.
  ///
  /// The lookup and the insertion happen under one lock, so concurrent callers for
  /// the same key always observe the same value.
  pub fn get_or_insert_with(&self, key: K, make: impl FnOnce() -> V) -> V {
    let mut entries = self.entries();
    if let Some(value) = entries.get(&key) {
      trace!("cache hit");
      return value.clone();
    }
    let value = make();
    entries.insert(key, value.clone());
    value
  }

  /// Replaces the value under an existing `key`. Returns false if `key` is absent.
  pub fn patch(&self, key: &K, value: V) -> bool {
    match self.entries().get_mut(key) {
      Some(slot) => {
        *slot = value;
        true
      }
      None => false,
    }
  }

  /// Removes the entry under `key` and passes it to the eviction hook.
  ///
  /// Deleting an absent key is a no-op. Returns true if an entry was removed.
  pub fn delete(&self, key: &K) -> bool {
    let removed = self.entries().remove(key);
    match removed {
      Some(value) => {
        self.evict(&value);
        true
      }
      None => false,
    }
  }

  /// Removes every entry, passing each to the eviction hook.
  pub fn clear(&self) {
    let removed: Vec<V> = self.entries().drain().map(|(_, value)| value).collect();
    for value in &removed {
      self.evict(value);
    }
  }

  /// Returns true if `key` is present.
  pub fn contains(&self, key: &K) -> bool {
    self.entries().contains_key(key)
  }

  /// Returns the number of entries.
  pub fn len(&self) -> usize {
    self.entries().len()
  }

  /// Returns true if the cache holds no entries.
  pub fn is_empty(&self) -> bool {
    self.entries().is_empty()
  }

  fn evict(&self, value: &V) {
    if let Some(on_evict) = &self.on_evict {
      on_evict(value);
    }
  }
}

impl<K, V> Default for Cache<K, V>
where
  K: Eq + Hash,
  V: Clone,
{
  fn default() -> Self {
    Self::new()
  }
}
