//! # The Mapping Contract
//!
//! This module defines the mutable-mapping interface that every mapstack
//! component implements and every child backend is expected to provide.
//! Because layers and leaves speak the same contract, the output of one
//! layer can become the backing store of another without glue code.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌─────────────────────────────────────────┐
//!                 │            Mapping<K, V>                │
//!                 │                                         │
//!                 │  get(&K) → Result<V>                    │
//!                 │  put(K, V) → Result<()>                 │
//!                 │  remove(&K) → Result<V>                 │
//!                 │  contains(&K) → Result<bool>            │
//!                 │  len() / is_empty() / keys()            │
//!                 │  close()                                │
//!                 │  get_many / put_many / remove_many      │
//!                 │  iter_keys / iter_values / iter_items   │
//!                 └────────────────────┬────────────────────┘
//!                                      │ implemented by
//!          ┌─────────────┬─────────────┼──────────────┬─────────────┐
//!          ▼             ▼             ▼              ▼             ▼
//!     ┌─────────┐  ┌──────────┐  ┌───────────┐  ┌──────────┐  ┌─────────┐
//!     │MemStore │  │   Lru    │  │  Buffer   │  │  Sieve   │  │  Cache  │
//!     │ (leaf)  │  │ (policy) │  │ (tiering) │  │ (routing)│  │ (r/t)   │
//!     └─────────┘  └────┬─────┘  └─────┬─────┘  └────┬─────┘  └────┬────┘
//!                       │              │             │             │
//!                       ▼              ▼             ▼             ▼
//!                  child mapping   fast + slow   N children   data + cache
//! ```
//!
//! ## Contract Summary
//!
//! | Operation      | Miss behavior        | Notes                             |
//! |----------------|----------------------|-----------------------------------|
//! | `get`          | `Error::NotFound`    | Policy layers may update recency  |
//! | `put`          | -                    | Idempotent overwrite              |
//! | `remove`       | `Error::NotFound`    | Returns the removed value         |
//! | `contains`     | `Ok(false)`          | Never updates access state        |
//! | `get_many`     | `BulkError::NotFoundAny` | Carries the missing subset    |
//! | `close`        | -                    | Idempotent; later ops fail        |
//!
//! ## Views
//!
//! `iter_keys` / `iter_values` / `iter_items` return live view handles:
//! `len()` and `contains()` re-query the mapping on every call, and `iter()`
//! takes a point-in-time key snapshot, resolving values through `get` and
//! skipping keys removed in the meantime. Views are not required to be
//! consistent across concurrent mutation.
//!
//! ## Ownership and Lifecycle
//!
//! Layers own the child mappings they were constructed with, but `close()`
//! does not propagate to children: the user composes shutdown explicitly
//! (the read-through [`Cache`](crate::policy::cache::Cache) can opt in to
//! propagation). After `close()`, every operation except `close()` itself
//! fails with [`Error::AlreadyClosed`].
//!
//! ## Thread Safety
//!
//! All operations take `&self`; implementations synchronize internally.
//! Policy layers guard their bookkeeping with a single lock, released
//! before child-mapping I/O and before every user callback, so callbacks
//! may re-enter the component safely.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use std::hash::Hash;

use crate::error::{BulkError, Error};

// =============================================================================
// Callback aliases
// =============================================================================

/// Weight of a key/value pair, used by the LRU budget. Must not block.
pub type WeightFn<K, V> = Arc<dyn Fn(&K, &V) -> u64 + Send + Sync>;

/// Eviction hook: invoked outside the component lock, once per evicted pair.
///
/// An `Err` aborts the eviction and is routed through the component's
/// [`EvictErrorFn`], if any.
pub type EvictFn<K, V> = Arc<dyn Fn(&K, &V) -> Result<(), Error> + Send + Sync>;

/// Eviction error handler: return `true` to treat the failure as handled
/// (the eviction proceeds), `false` to leave the key resident and re-raise.
pub type EvictErrorFn<K, V> = Arc<dyn Fn(&K, &V, &Error) -> bool + Send + Sync>;

// =============================================================================
// Metrics
// =============================================================================

/// Snapshot of mapping-level activity counters.
///
/// All fields are cumulative since creation. Implementations without
/// tracking return zeroed metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapMetrics {
    /// Successful lookups.
    pub hits: u64,
    /// Failed lookups.
    pub misses: u64,
    /// New key insertions.
    pub inserts: u64,
    /// Value updates for existing keys.
    pub updates: u64,
    /// Explicit removals.
    pub removes: u64,
    /// Entries evicted by a policy layer.
    pub evictions: u64,
}

// =============================================================================
// Mapping
// =============================================================================

/// A mutable key/value mapping with internal synchronization.
///
/// The trait itself places no bounds on `K` and `V`; implementations
/// typically require `K: Clone + Eq + Hash + Send + Sync` and
/// `V: Clone + Send + Sync`. Values that are expensive to clone should be
/// stored as `Arc<T>`.
///
/// # Example
///
/// ```
/// use mapstack::store::hashmap::MemStore;
/// use mapstack::traits::Mapping;
///
/// let store: MemStore<u64, String> = MemStore::new();
/// store.put(1, "one".to_string()).unwrap();
/// assert_eq!(store.get(&1).unwrap(), "one");
/// assert_eq!(store.len(), 1);
/// ```
pub trait Mapping<K, V>: Send + Sync {
    /// Returns the value bound to `key`.
    ///
    /// Fails with [`Error::NotFound`] on a miss. Policy layers may update
    /// access metadata (e.g. LRU recency) on success; this is the only
    /// access path that does so.
    fn get(&self, key: &K) -> Result<V, Error>;

    /// Binds `key` to `value`, overwriting any previous binding.
    fn put(&self, key: K, value: V) -> Result<(), Error>;

    /// Removes the binding for `key` and returns its value.
    ///
    /// Fails with [`Error::NotFound`] if the key was absent.
    fn remove(&self, key: &K) -> Result<V, Error>;

    /// Returns `true` if `key` is currently bound.
    ///
    /// Never updates access metadata.
    fn contains(&self, key: &K) -> Result<bool, Error>;

    /// Returns the number of distinct keys currently bound.
    fn len(&self) -> usize;

    /// Returns `true` if the mapping contains no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a point-in-time snapshot of the bound keys.
    fn keys(&self) -> Result<Vec<K>, Error>;

    /// Releases resources held by this mapping.
    ///
    /// Idempotent. Does not close child mappings. Subsequent operations
    /// fail with [`Error::AlreadyClosed`].
    fn close(&self) -> Result<(), Error>;

    /// Returns a snapshot of activity counters.
    ///
    /// Default implementation returns zeroed metrics.
    fn metrics(&self) -> MapMetrics {
        MapMetrics::default()
    }

    /// Fetches several keys, pairing each with its value in request order.
    ///
    /// The default implementation loops over [`get`](Self::get); layers may
    /// override it with something cheaper.
    ///
    /// # Errors
    ///
    /// Fails with [`BulkError::NotFoundAny`] carrying the absent subset if
    /// any key is missing. Values read before the failure are discarded.
    fn get_many(&self, keys: &[K]) -> Result<Vec<(K, V)>, BulkError<K>>
    where
        K: Clone,
    {
        let mut found = Vec::with_capacity(keys.len());
        let mut missing = Vec::new();
        for key in keys {
            match self.get(key) {
                Ok(value) => found.push((key.clone(), value)),
                Err(Error::NotFound) => missing.push(key.clone()),
                Err(err) => return Err(BulkError::Op(err)),
            }
        }
        if missing.is_empty() {
            Ok(found)
        } else {
            Err(BulkError::NotFoundAny(missing))
        }
    }

    /// Stores several pairs. The default implementation loops over
    /// [`put`](Self::put).
    fn put_many(&self, items: Vec<(K, V)>) -> Result<(), Error> {
        for (key, value) in items {
            self.put(key, value)?;
        }
        Ok(())
    }

    /// Removes several keys.
    ///
    /// # Errors
    ///
    /// Fails with [`BulkError::NotFoundAny`] carrying the keys that were
    /// absent; present keys are still removed.
    fn remove_many(&self, keys: &[K]) -> Result<(), BulkError<K>>
    where
        K: Clone,
    {
        let mut missing = Vec::new();
        for key in keys {
            match self.remove(key) {
                Ok(_) => {}
                Err(Error::NotFound) => missing.push(key.clone()),
                Err(err) => return Err(BulkError::Op(err)),
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(BulkError::NotFoundAny(missing))
        }
    }

    /// Returns a live view over the mapping's keys.
    fn iter_keys(&self) -> KeysView<'_, K, V>
    where
        Self: Sized,
    {
        KeysView::new(self)
    }

    /// Returns a live view over the mapping's values.
    fn iter_values(&self) -> ValuesView<'_, K, V>
    where
        Self: Sized,
    {
        ValuesView::new(self)
    }

    /// Returns a live view over the mapping's key/value pairs.
    fn iter_items(&self) -> ItemsView<'_, K, V>
    where
        Self: Sized,
    {
        ItemsView::new(self)
    }
}

// =============================================================================
// Forwarding impls
// =============================================================================

impl<K, V, M: Mapping<K, V> + ?Sized> Mapping<K, V> for Arc<M> {
    fn get(&self, key: &K) -> Result<V, Error> {
        (**self).get(key)
    }

    fn put(&self, key: K, value: V) -> Result<(), Error> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &K) -> Result<V, Error> {
        (**self).remove(key)
    }

    fn contains(&self, key: &K) -> Result<bool, Error> {
        (**self).contains(key)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn keys(&self) -> Result<Vec<K>, Error> {
        (**self).keys()
    }

    fn close(&self) -> Result<(), Error> {
        (**self).close()
    }

    fn metrics(&self) -> MapMetrics {
        (**self).metrics()
    }

    fn get_many(&self, keys: &[K]) -> Result<Vec<(K, V)>, BulkError<K>>
    where
        K: Clone,
    {
        (**self).get_many(keys)
    }

    fn put_many(&self, items: Vec<(K, V)>) -> Result<(), Error> {
        (**self).put_many(items)
    }

    fn remove_many(&self, keys: &[K]) -> Result<(), BulkError<K>>
    where
        K: Clone,
    {
        (**self).remove_many(keys)
    }
}

impl<K, V, M: Mapping<K, V> + ?Sized> Mapping<K, V> for Box<M> {
    fn get(&self, key: &K) -> Result<V, Error> {
        (**self).get(key)
    }

    fn put(&self, key: K, value: V) -> Result<(), Error> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &K) -> Result<V, Error> {
        (**self).remove(key)
    }

    fn contains(&self, key: &K) -> Result<bool, Error> {
        (**self).contains(key)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn keys(&self) -> Result<Vec<K>, Error> {
        (**self).keys()
    }

    fn close(&self) -> Result<(), Error> {
        (**self).close()
    }

    fn metrics(&self) -> MapMetrics {
        (**self).metrics()
    }

    fn get_many(&self, keys: &[K]) -> Result<Vec<(K, V)>, BulkError<K>>
    where
        K: Clone,
    {
        (**self).get_many(keys)
    }

    fn put_many(&self, items: Vec<(K, V)>) -> Result<(), Error> {
        (**self).put_many(items)
    }

    fn remove_many(&self, keys: &[K]) -> Result<(), BulkError<K>>
    where
        K: Clone,
    {
        (**self).remove_many(keys)
    }
}

// =============================================================================
// Views
// =============================================================================

/// Live view over a mapping's keys.
///
/// `len()` and `contains()` re-query the mapping; `iter()` takes a
/// point-in-time key snapshot.
pub struct KeysView<'a, K, V> {
    map: &'a dyn Mapping<K, V>,
}

impl<'a, K, V> KeysView<'a, K, V> {
    /// Creates a view over `map`.
    pub fn new(map: &'a dyn Mapping<K, V>) -> Self {
        Self { map }
    }

    /// Returns the current number of keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the mapping is currently empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns `true` if `key` is currently bound.
    pub fn contains(&self, key: &K) -> Result<bool, Error> {
        self.map.contains(key)
    }

    /// Iterates over a snapshot of the keys taken at call time.
    pub fn iter(&self) -> Result<std::vec::IntoIter<K>, Error> {
        Ok(self.map.keys()?.into_iter())
    }
}

/// Live view over a mapping's values.
///
/// Iteration snapshots the keys at call time and resolves each value
/// through `get`, skipping keys removed in the meantime.
pub struct ValuesView<'a, K, V> {
    map: &'a dyn Mapping<K, V>,
}

impl<'a, K, V> ValuesView<'a, K, V> {
    /// Creates a view over `map`.
    pub fn new(map: &'a dyn Mapping<K, V>) -> Self {
        Self { map }
    }

    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the mapping is currently empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over the values for a snapshot of the keys.
    pub fn iter(&self) -> Result<std::vec::IntoIter<V>, Error> {
        let mut values = Vec::new();
        for key in self.map.keys()? {
            match self.map.get(&key) {
                Ok(value) => values.push(value),
                Err(Error::NotFound) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(values.into_iter())
    }
}

/// Live view over a mapping's key/value pairs.
pub struct ItemsView<'a, K, V> {
    map: &'a dyn Mapping<K, V>,
}

impl<'a, K, V> ItemsView<'a, K, V> {
    /// Creates a view over `map`.
    pub fn new(map: &'a dyn Mapping<K, V>) -> Self {
        Self { map }
    }

    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the mapping is currently empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns `true` if `key` is currently bound.
    pub fn contains(&self, key: &K) -> Result<bool, Error> {
        self.map.contains(key)
    }

    /// Iterates over the pairs for a snapshot of the keys.
    pub fn iter(&self) -> Result<std::vec::IntoIter<(K, V)>, Error> {
        let mut items = Vec::new();
        for key in self.map.keys()? {
            match self.map.get(&key) {
                Ok(value) => items.push((key, value)),
                Err(Error::NotFound) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(items.into_iter())
    }
}

// =============================================================================
// Contract checks (test support)
// =============================================================================

/// Asserts the basic contract invariants on `map`: `contains` agrees with
/// `get`, and `len` agrees with the key snapshot.
///
/// Intended for use in tests against any `Mapping` implementation.
pub fn check_mapping_invariants<K, V, M>(map: &M)
where
    K: Clone + Eq + Hash,
    M: Mapping<K, V>,
{
    let keys = map.keys().expect("keys() failed");
    assert_eq!(map.len(), keys.len(), "len() disagrees with keys()");

    let distinct: FxHashSet<K> = keys.iter().cloned().collect();
    assert_eq!(distinct.len(), keys.len(), "keys() contains duplicates");

    for key in &keys {
        assert!(
            map.contains(key).expect("contains() failed"),
            "key snapshot contains an unbound key"
        );
        assert!(map.get(key).is_ok(), "contains(k) but get(k) misses");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::hashmap::MemStore;

    #[test]
    fn default_get_many_reports_missing_subset() {
        let store: MemStore<u64, &str> = MemStore::new();
        store.put(1, "one").unwrap();
        store.put(3, "three").unwrap();

        let err = store.get_many(&[1, 2, 3, 4]).unwrap_err();
        assert_eq!(err, BulkError::NotFoundAny(vec![2, 4]));

        let found = store.get_many(&[3, 1]).unwrap();
        assert_eq!(found, vec![(3, "three"), (1, "one")]);
    }

    #[test]
    fn default_put_many_stores_all() {
        let store: MemStore<u64, &str> = MemStore::new();
        store.put_many(vec![(1, "a"), (2, "b")]).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&2).unwrap(), "b");
    }

    #[test]
    fn default_remove_many_removes_present_keys() {
        let store: MemStore<u64, &str> = MemStore::new();
        store.put(1, "a").unwrap();
        store.put(2, "b").unwrap();

        let err = store.remove_many(&[1, 9]).unwrap_err();
        assert_eq!(err, BulkError::NotFoundAny(vec![9]));
        // Key 1 was still removed.
        assert!(!store.contains(&1).unwrap());
        assert!(store.contains(&2).unwrap());
    }

    #[test]
    fn keys_view_reflects_later_mutations() {
        let store: MemStore<u64, &str> = MemStore::new();
        store.put(1, "a").unwrap();

        let view = store.iter_keys();
        assert_eq!(view.len(), 1);

        store.put(2, "b").unwrap();
        assert_eq!(view.len(), 2);
        assert!(view.contains(&2).unwrap());

        let mut keys: Vec<u64> = view.iter().unwrap().collect();
        keys.sort_unstable();
        assert_eq!(keys, vec![1, 2]);
    }

    #[test]
    fn values_view_skips_keys_removed_mid_iteration() {
        let store: MemStore<u64, &str> = MemStore::new();
        store.put(1, "a").unwrap();
        store.put(2, "b").unwrap();

        let view = store.iter_values();
        store.remove(&1).unwrap();

        let values: Vec<&str> = view.iter().unwrap().collect();
        assert_eq!(values, vec!["b"]);
    }

    #[test]
    fn items_view_pairs_keys_with_values() {
        let store: MemStore<u64, &str> = MemStore::new();
        store.put(7, "seven").unwrap();

        let items: Vec<(u64, &str)> = store.iter_items().iter().unwrap().collect();
        assert_eq!(items, vec![(7, "seven")]);
    }

    #[test]
    fn forwarding_impls_delegate() {
        let store: Arc<MemStore<u64, &str>> = Arc::new(MemStore::new());
        store.put(1, "a").unwrap();
        assert_eq!(Mapping::get(&store, &1).unwrap(), "a");

        let boxed: Box<dyn Mapping<u64, &str>> = Box::new(MemStore::new());
        boxed.put(2, "b").unwrap();
        assert_eq!(boxed.len(), 1);
        assert_eq!(boxed.remove(&2).unwrap(), "b");
    }

    #[test]
    fn contract_checker_accepts_mem_store() {
        let store: MemStore<u64, &str> = MemStore::new();
        store.put(1, "a").unwrap();
        store.put(2, "b").unwrap();
        check_mapping_invariants(&store);
    }
}
