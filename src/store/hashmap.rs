//! In-memory hash-map leaf mapping.
//!
//! `MemStore` is the plain-dictionary leaf of a layer stack: policy layers
//! impose eviction, tiering, or routing on top of it. It stores values
//! directly and clones them out on access, so cheap-to-clone values (or
//! `Arc<T>`) are the natural fit.
//!
//! ## Key Components
//! - [`MemStore`]: thread-safe `FxHashMap` behind a `parking_lot::RwLock`.
//!
//! ## Core Operations
//! - `get` / `put` / `remove` / `contains`: O(1) average.
//! - `keys`: O(n) snapshot under the read lock.
//! - `close`: drops all entries; later operations fail.
//!
//! ## Thread Safety
//! All operations take `&self`; a single `RwLock` guards the map. Metrics
//! are tracked with relaxed atomics so reads stay on the read lock.
//!
//! ## Example Usage
//! ```
//! use mapstack::store::hashmap::MemStore;
//! use mapstack::traits::Mapping;
//!
//! let store: MemStore<u64, String> = MemStore::new();
//! store.put(1, "hello".to_string()).unwrap();
//! assert_eq!(store.get(&1).unwrap(), "hello");
//! ```

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::Error;
use crate::traits::{MapMetrics, Mapping};

// =============================================================================
// Metrics counters
// =============================================================================

/// Activity counters using atomics for thread-safe updates.
#[derive(Debug, Default)]
pub(crate) struct MapCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    removes: AtomicU64,
    evictions: AtomicU64,
}

impl MapCounters {
    pub(crate) fn snapshot(&self) -> MapMetrics {
        MapMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn inc_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }
}

// =============================================================================
// MemStore
// =============================================================================

/// Thread-safe in-memory mapping backed by an `FxHashMap`.
#[derive(Debug)]
pub struct MemStore<K, V> {
    map: RwLock<FxHashMap<K, V>>,
    closed: AtomicBool,
    counters: MapCounters,
}

impl<K, V> MemStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            map: RwLock::new(FxHashMap::default()),
            closed: AtomicBool::new(false),
            counters: MapCounters::default(),
        }
    }

    /// Creates an empty store with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut map = FxHashMap::default();
        map.reserve(capacity);
        Self {
            map: RwLock::new(map),
            closed: AtomicBool::new(false),
            counters: MapCounters::default(),
        }
    }

    /// Returns `true` if the store has been closed.
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
}

impl<K, V> Default for MemStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Mapping<K, V> for MemStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Result<V, Error> {
        self.check_open()?;
        match self.map.read().get(key) {
            Some(value) => {
                self.counters.inc_hit();
                Ok(value.clone())
            }
            None => {
                self.counters.inc_miss();
                Err(Error::NotFound)
            }
        }
    }

    fn put(&self, key: K, value: V) -> Result<(), Error> {
        self.check_open()?;
        let previous = self.map.write().insert(key, value);
        if previous.is_some() {
            self.counters.inc_update();
        } else {
            self.counters.inc_insert();
        }
        Ok(())
    }

    fn remove(&self, key: &K) -> Result<V, Error> {
        self.check_open()?;
        match self.map.write().remove(key) {
            Some(value) => {
                self.counters.inc_remove();
                Ok(value)
            }
            None => Err(Error::NotFound),
        }
    }

    fn contains(&self, key: &K) -> Result<bool, Error> {
        self.check_open()?;
        Ok(self.map.read().contains_key(key))
    }

    fn len(&self) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.map.read().len()
    }

    fn keys(&self) -> Result<Vec<K>, Error> {
        self.check_open()?;
        Ok(self.map.read().keys().cloned().collect())
    }

    fn close(&self) -> Result<(), Error> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.map.write().clear();
        }
        Ok(())
    }

    fn metrics(&self) -> MapMetrics {
        self.counters.snapshot()
    }
}

// =============================================================================
// Tests
// =============================================================================
