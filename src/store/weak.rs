//! Mapping with weakly-held values.
//!
//! `WeakValueMapping` binds keys to `Arc<T>` values but retains only a
//! `Weak<T>` internally: an entry survives exactly as long as some other
//! holder keeps the `Arc` alive. Pair it with
//! [`Cache`](crate::policy::cache::Cache) when the working set is bounded
//! by live value references elsewhere in the application.
//!
//! Dead entries are swept lazily: a failed upgrade removes the entry, and
//! `len()` / `keys()` sweep the whole table first. `len()` is therefore
//! best-effort; a value may be dropped by another thread between the sweep
//! and the caller's use of the count.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::Error;
use crate::traits::Mapping;

/// Mapping whose values vanish once no `Arc` holder remains.
#[derive(Debug)]
pub struct WeakValueMapping<K, T> {
    map: RwLock<FxHashMap<K, Weak<T>>>,
    closed: AtomicBool,
}

impl<K, T> WeakValueMapping<K, T>
where
    K: Clone + Eq + Hash + Send + Sync,
    T: Send + Sync,
{
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self {
            map: RwLock::new(FxHashMap::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns `true` if the mapping has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Drops entries whose values have been collected.
    pub fn sweep(&self) {
        self.map.write().retain(|_, weak| weak.strong_count() > 0);
    }

    fn check_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            Err(Error::AlreadyClosed)
        } else {
            Ok(())
        }
    }
}

impl<K, T> Default for WeakValueMapping<K, T>
where
    K: Clone + Eq + Hash + Send + Sync,
    T: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> Mapping<K, Arc<T>> for WeakValueMapping<K, T>
where
    K: Clone + Eq + Hash + Send + Sync,
    T: Send + Sync,
{
    fn get(&self, key: &K) -> Result<Arc<T>, Error> {
        self.check_open()?;
        if let Some(weak) = self.map.read().get(key) {
            if let Some(value) = weak.upgrade() {
                return Ok(value);
            }
        } else {
            return Err(Error::NotFound);
        }
        // The value died; reap the entry before reporting the miss.
        self.map.write().remove(key);
        Err(Error::NotFound)
    }

    fn put(&self, key: K, value: Arc<T>) -> Result<(), Error> {
        self.check_open()?;
        self.map.write().insert(key, Arc::downgrade(&value));
        Ok(())
    }

    fn remove(&self, key: &K) -> Result<Arc<T>, Error> {
        self.check_open()?;
        match self.map.write().remove(key) {
            Some(weak) => weak.upgrade().ok_or(Error::NotFound),
            None => Err(Error::NotFound),
        }
    }

    fn contains(&self, key: &K) -> Result<bool, Error> {
        self.check_open()?;
        Ok(self
            .map
            .read()
            .get(key)
            .is_some_and(|weak| weak.strong_count() > 0))
    }

    fn len(&self) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.sweep();
        self.map.read().len()
    }

    fn keys(&self) -> Result<Vec<K>, Error> {
        self.check_open()?;
        self.sweep();
        Ok(self.map.read().keys().cloned().collect())
    }

    fn close(&self) -> Result<(), Error> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.map.write().clear();
        }
        Ok(())
    }
}
