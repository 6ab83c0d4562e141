//! # Read-Through Cache Layer
//!
//! `Cache` fronts a mapping with an expensive `get` (the *data* mapping)
//! with a cheaper one (the *cache* mapping). Reads consult the cache
//! first; a miss falls through to the data mapping and the value is
//! retained in the cache on the way out.
//!
//! The cache mapping may lose keys on its own schedule: an [`Lru`]
//! bounds it by weight, a [`WeakValueMapping`] bounds it by live value
//! references elsewhere in the application.
//!
//! ```text
//!      get(k) ──► cache hit? ──► value
//!                   │ miss
//!                   ▼
//!                data.get(k) ──► cache.put(k, v) (best effort) ──► value
//!
//!      put(k, v) ──► cache invalidate ──► data.put
//!                                          └─ update_on_set: cache.put
//! ```
//!
//! Writes invalidate the cache *before* touching the data mapping, so a
//! failed data write can never leave a stale cached value behind.
//!
//! [`Lru`]: crate::policy::lru::Lru
//! [`WeakValueMapping`]: crate::store::weak::WeakValueMapping

use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Error;
use crate::traits::{MapMetrics, Mapping};

/// Read-through cache over a backing data mapping.
pub struct Cache<K, V, D, C> {
    data: D,
    cache: C,
    /// Store written values in the cache too; otherwise writes only
    /// invalidate.
    update_on_set: bool,
    /// Close the children when this layer closes.
    close_children: bool,
    closed: AtomicBool,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, D, C> Cache<K, V, D, C>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
    D: Mapping<K, V>,
    C: Mapping<K, V>,
{
    /// Creates a read-through cache.
    ///
    /// With `update_on_set`, writes are stored in the cache as well;
    /// otherwise a write just invalidates the cached entry and the next
    /// read repopulates it from `data`.
    pub fn new(data: D, cache: C, update_on_set: bool) -> Self {
        Self {
            data,
            cache,
            update_on_set,
            close_children: false,
            closed: AtomicBool::new(false),
            _marker: PhantomData,
        }
    }

    /// Opts in to closing both children when this layer is closed. This
    /// is the one place in the crate where `close()` propagates.
    pub fn propagate_close(mut self) -> Self {
        self.close_children = true;
        self
    }

    /// Returns the backing data mapping.
    pub fn data(&self) -> &D {
        &self.data
    }

    /// Returns the cache mapping.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Returns `true` if the layer has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            Err(Error::AlreadyClosed)
        } else {
            Ok(())
        }
    }

    /// Drops `key` from the cache mapping, tolerating its absence.
    fn invalidate(&self, key: &K) -> Result<(), Error> {
        match self.cache.remove(key) {
            Ok(_) | Err(Error::NotFound) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

impl<K, V, D, C> Mapping<K, V> for Cache<K, V, D, C>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
    D: Mapping<K, V>,
    C: Mapping<K, V>,
{
    fn get(&self, key: &K) -> Result<V, Error> {
        self.check_open()?;
        match self.cache.get(key) {
            Ok(value) => return Ok(value),
            Err(Error::NotFound) => {}
            Err(err) => return Err(err),
        }
        let value = self.data.get(key)?;
        // Best effort: the cache may refuse (e.g. a weak-value cache and
        // an unshared value); the read still succeeds.
        let _ = self.cache.put(key.clone(), value.clone());
        Ok(value)
    }

    fn put(&self, key: K, value: V) -> Result<(), Error> {
        self.check_open()?;
        // Invalidate first: if the data write fails there must be no
        // stale cached value left behind.
        self.invalidate(&key)?;
        self.data.put(key.clone(), value.clone())?;
        if self.update_on_set {
            self.cache.put(key, value)?;
        }
        Ok(())
    }

    fn remove(&self, key: &K) -> Result<V, Error> {
        self.check_open()?;
        self.invalidate(key)?;
        self.data.remove(key)
    }

    fn contains(&self, key: &K) -> Result<bool, Error> {
        self.check_open()?;
        self.data.contains(key)
    }

    fn len(&self) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.data.len()
    }

    fn keys(&self) -> Result<Vec<K>, Error> {
        self.check_open()?;
        self.data.keys()
    }

    fn close(&self) -> Result<(), Error> {
        if !self.closed.swap(true, Ordering::AcqRel) && self.close_children {
            self.cache.close()?;
            self.data.close()?;
        }
        Ok(())
    }

    /// Cache-mapping activity counters (hit rate of the fronting tier).
    fn metrics(&self) -> MapMetrics {
        self.cache.metrics()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::hashmap::MemStore;
    use crate::store::weak::WeakValueMapping;

    type MemCache = Cache<u64, &'static str, MemStore<u64, &'static str>, MemStore<u64, &'static str>>;

    fn seeded_cache(update_on_set: bool) -> MemCache {
        let data = MemStore::new();
        data.put(1, "one").unwrap();
        data.put(2, "two").unwrap();
        Cache::new(data, MemStore::new(), update_on_set)
    }

    #[test]
    fn read_through_populates_the_cache() {
        let cache = seeded_cache(true);
        assert!(!cache.cache().contains(&1).unwrap());

        assert_eq!(cache.get(&1).unwrap(), "one");
        assert!(cache.cache().contains(&1).unwrap());

        // Second read is served by the cache, not the data mapping.
        let data_hits = cache.data().metrics().hits;
        assert_eq!(cache.get(&1).unwrap(), "one");
        assert_eq!(cache.data().metrics().hits, data_hits);
    }

    #[test]
    fn update_on_set_stores_in_both() {
        let cache = seeded_cache(true);
        cache.put(3, "three").unwrap();
        assert!(cache.data().contains(&3).unwrap());
        assert!(cache.cache().contains(&3).unwrap());
    }

    #[test]
    fn write_invalidates_when_update_on_set_is_off() {
        let cache = seeded_cache(false);
        assert_eq!(cache.get(&1).unwrap(), "one");
        assert!(cache.cache().contains(&1).unwrap());

        cache.put(1, "uno").unwrap();
        assert!(!cache.cache().contains(&1).unwrap());
        // The next read repopulates from data.
        assert_eq!(cache.get(&1).unwrap(), "uno");
        assert!(cache.cache().contains(&1).unwrap());
    }

    #[test]
    fn failed_data_write_leaves_no_stale_cache_entry() {
        let cache = seeded_cache(true);
        assert_eq!(cache.get(&1).unwrap(), "one");
        cache.data().close().unwrap();

        assert_eq!(cache.put(1, "stale"), Err(Error::AlreadyClosed));
        // The old value was invalidated before the write was attempted.
        assert!(!cache.cache().contains(&1).unwrap());
    }

    #[test]
    fn remove_invalidates_both_sides() {
        let cache = seeded_cache(true);
        cache.get(&1).unwrap();
        assert_eq!(cache.remove(&1).unwrap(), "one");
        assert!(!cache.cache().contains(&1).unwrap());
        assert_eq!(cache.remove(&1), Err(Error::NotFound));
    }

    #[test]
    fn len_and_keys_reflect_the_data_mapping() {
        let cache = seeded_cache(true);
        assert_eq!(cache.len(), 2);
        let mut keys = cache.keys().unwrap();
        keys.sort_unstable();
        assert_eq!(keys, vec![1, 2]);
    }

    #[test]
    fn close_does_not_propagate_by_default() {
        let cache = seeded_cache(true);
        cache.close().unwrap();
        cache.close().unwrap();
        assert_eq!(cache.get(&1), Err(Error::AlreadyClosed));
        // Children untouched.
        assert_eq!(cache.data().get(&1).unwrap(), "one");
    }

    #[test]
    fn close_propagates_when_opted_in() {
        let cache = seeded_cache(true).propagate_close();
        cache.close().unwrap();
        assert!(cache.data().is_closed());
        assert!(cache.cache().is_closed());
    }

    #[test]
    fn weak_value_cache_serves_only_while_value_is_held() {
        let data: MemStore<u64, Arc<String>> = MemStore::new();
        data.put(1, Arc::new("payload".to_string())).unwrap();
        let cache = Cache::new(data, WeakValueMapping::new(), true);

        let held = cache.get(&1).unwrap();
        assert!(cache.cache().contains(&1).unwrap());

        // Even with the backing entry gone, the cache serves the value as
        // long as someone still holds it.
        cache.data().remove(&1).unwrap();
        assert_eq!(*cache.get(&1).unwrap(), "payload");

        // Last holder gone: the weak entry dies and nothing backs the key.
        drop(held);
        assert_eq!(cache.get(&1), Err(Error::NotFound));
    }
}
