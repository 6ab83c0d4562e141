//! # Key-Routed Fan-Out Layer
//!
//! `Sieve` multiplexes one logical mapping across several labelled
//! children: every operation on a key is dispatched to the single child a
//! user-supplied selector chooses. Typical selectors split by size class,
//! tenant, or key prefix.
//!
//! ```text
//!                      selector(k) → label
//!                              │
//!            ┌─────────────────┼─────────────────┐
//!            ▼                 ▼                 ▼
//!      ┌──────────┐      ┌──────────┐      ┌──────────┐
//!      │ "small"  │      │ "medium" │      │ "large"  │
//!      │ MemStore │      │   Lru    │      │   ...    │
//!      └──────────┘      └──────────┘      └──────────┘
//! ```
//!
//! The selector must be pure and total on every key ever stored: a key
//! lives in exactly the child its selector chooses, and nothing tracks
//! relocation if the selector's answer changes for a resident key.
//!
//! `len()` sums the children; `keys()` concatenates child snapshots in
//! child registration order.

use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;

use crate::error::{ConfigError, Error};
use crate::traits::Mapping;

/// Routes each key to one of several child mappings by label.
#[derive(Debug)]
pub struct Sieve<K, V, M, L, R> {
    children: Vec<(L, M)>,
    index: FxHashMap<L, usize>,
    selector: R,
    closed: AtomicBool,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, M, L, R> Sieve<K, V, M, L, R>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
    M: Mapping<K, V>,
    L: Clone + Eq + Hash + std::fmt::Debug + Send + Sync,
    R: Fn(&K) -> L + Send + Sync,
{
    /// Creates a sieve over labelled children.
    ///
    /// Children are registered in the given order, which fixes the
    /// iteration order of `keys()`.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigError`] if two children share a label or none
    /// are given.
    pub fn try_new(children: Vec<(L, M)>, selector: R) -> Result<Self, ConfigError> {
        if children.is_empty() {
            return Err(ConfigError::new("sieve requires at least one child mapping"));
        }
        let mut index = FxHashMap::default();
        for (position, (label, _)) in children.iter().enumerate() {
            if index.insert(label.clone(), position).is_some() {
                return Err(ConfigError::new(format!(
                    "duplicate sieve label {label:?}"
                )));
            }
        }
        Ok(Self {
            children,
            index,
            selector,
            closed: AtomicBool::new(false),
            _marker: PhantomData,
        })
    }

    /// Returns the child mapping registered under `label`.
    pub fn child(&self, label: &L) -> Option<&M> {
        self.index.get(label).map(|&position| &self.children[position].1)
    }

    /// Returns the registered labels in registration order.
    pub fn labels(&self) -> impl Iterator<Item = &L> {
        self.children.iter().map(|(label, _)| label)
    }

    /// Returns `true` if the sieve has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves the child responsible for `key`.
    fn route(&self, key: &K) -> Result<&M, Error> {
        if self.is_closed() {
            return Err(Error::AlreadyClosed);
        }
        let label = (self.selector)(key);
        match self.index.get(&label) {
            Some(&position) => Ok(&self.children[position].1),
            None => Err(Error::Config(ConfigError::new(format!(
                "selector produced unregistered label {label:?}"
            )))),
        }
    }
}

impl<K, V, M, L, R> Mapping<K, V> for Sieve<K, V, M, L, R>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
    M: Mapping<K, V>,
    L: Clone + Eq + Hash + std::fmt::Debug + Send + Sync,
    R: Fn(&K) -> L + Send + Sync,
{
    fn get(&self, key: &K) -> Result<V, Error> {
        self.route(key)?.get(key)
    }

    fn put(&self, key: K, value: V) -> Result<(), Error> {
        self.route(&key)?.put(key, value)
    }

    fn remove(&self, key: &K) -> Result<V, Error> {
        self.route(key)?.remove(key)
    }

    fn contains(&self, key: &K) -> Result<bool, Error> {
        self.route(key)?.contains(key)
    }

    fn len(&self) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.children.iter().map(|(_, child)| child.len()).sum()
    }

    /// Child snapshots concatenated in registration order.
    fn keys(&self) -> Result<Vec<K>, Error> {
        if self.is_closed() {
            return Err(Error::AlreadyClosed);
        }
        let mut keys = Vec::new();
        for (_, child) in &self.children {
            keys.extend(child.keys()?);
        }
        Ok(keys)
    }

    /// Marks the sieve closed. Children stay open; the user composes
    /// their shutdown.
    fn close(&self) -> Result<(), Error> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
