//! Builders for the policy layers.
//!
//! The layer constructors take several optional callbacks; the builders
//! here collect them with a fluent API and hide the internal `Arc`
//! wrapping of the callback types.
//!
//! ## Example
//!
//! ```rust
//! use mapstack::builder::BufferBuilder;
//! use mapstack::store::hashmap::MemStore;
//! use mapstack::traits::Mapping;
//!
//! let buffer = BufferBuilder::new(MemStore::new(), MemStore::new(), 100)
//!     .weight(|_k: &u64, v: &Vec<u8>| v.len() as u64)
//!     .fast_to_slow(|k: &u64, _v: &Vec<u8>| {
//!         println!("demoting {k}");
//!         Ok(())
//!     })
//!     .build();
//! buffer.put(1, vec![0u8; 16]).unwrap();
//! assert_eq!(buffer.len(), 1);
//! ```

use std::hash::Hash;
use std::sync::Arc;

use crate::error::Error;
use crate::offload::{Executor, OffloadExecutor};
use crate::policy::async_buffer::AsyncBuffer;
use crate::policy::buffer::Buffer;
use crate::policy::lru::{entry_count_weight, Lru};
use crate::traits::{EvictErrorFn, EvictFn, Mapping, WeightFn};

// =============================================================================
// LruBuilder
// =============================================================================

/// Builder for [`Lru`] layers.
pub struct LruBuilder<K, V, M>
where
    K: 'static,
    V: 'static,
{
    n: u64,
    child: M,
    weight: WeightFn<K, V>,
    on_evict: Vec<EvictFn<K, V>>,
    on_cache_evict: Vec<EvictFn<K, V>>,
    on_evict_error: Option<EvictErrorFn<K, V>>,
}

impl<K, V, M> LruBuilder<K, V, M>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    M: Mapping<K, V>,
{
    /// Starts a builder for an LRU with budget `n` over `child`.
    pub fn new(n: u64, child: M) -> Self {
        Self {
            n,
            child,
            weight: entry_count_weight(),
            on_evict: Vec::new(),
            on_cache_evict: Vec::new(),
            on_evict_error: None,
        }
    }

    /// Sets the weight function (default: every pair weighs 1).
    pub fn weight(mut self, weight: impl Fn(&K, &V) -> u64 + Send + Sync + 'static) -> Self {
        self.weight = Arc::new(weight);
        self
    }

    /// Appends an eviction callback; callbacks fire in registration order.
    pub fn on_evict(
        mut self,
        callback: impl Fn(&K, &V) -> Result<(), Error> + Send + Sync + 'static,
    ) -> Self {
        self.on_evict.push(Arc::new(callback));
        self
    }

    /// Appends a callback for evictions of clean keys (values already safe
    /// elsewhere).
    pub fn on_cache_evict(
        mut self,
        callback: impl Fn(&K, &V) -> Result<(), Error> + Send + Sync + 'static,
    ) -> Self {
        self.on_cache_evict.push(Arc::new(callback));
        self
    }

    /// Sets the eviction error handler: return `true` to treat the failure
    /// as handled and continue the eviction.
    pub fn on_evict_error(
        mut self,
        handler: impl Fn(&K, &V, &Error) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.on_evict_error = Some(Arc::new(handler));
        self
    }

    /// Builds the LRU.
    pub fn build(self) -> Lru<K, V, M> {
        Lru::assemble(
            self.n,
            self.child,
            self.weight,
            self.on_evict,
            self.on_cache_evict,
            self.on_evict_error,
        )
    }
}

// =============================================================================
// BufferBuilder
// =============================================================================

/// Builder for [`Buffer`] and [`AsyncBuffer`] layers.
pub struct BufferBuilder<K, V, F, S>
where
    K: 'static,
    V: 'static,
{
    fast: F,
    slow: S,
    n: u64,
    weight: WeightFn<K, V>,
    fast_to_slow: Vec<EvictFn<K, V>>,
    slow_to_fast: Vec<EvictFn<K, V>>,
    on_evict_error: Option<EvictErrorFn<K, V>>,
}

impl<K, V, F, S> BufferBuilder<K, V, F, S>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Mapping<K, V> + 'static,
    S: Mapping<K, V> + 'static,
{
    /// Starts a builder for a two-tier buffer with fast-tier budget `n`.
    pub fn new(fast: F, slow: S, n: u64) -> Self {
        Self {
            fast,
            slow,
            n,
            weight: entry_count_weight(),
            fast_to_slow: Vec::new(),
            slow_to_fast: Vec::new(),
            on_evict_error: None,
        }
    }

    /// Sets the weight function (default: every pair weighs 1).
    pub fn weight(mut self, weight: impl Fn(&K, &V) -> u64 + Send + Sync + 'static) -> Self {
        self.weight = Arc::new(weight);
        self
    }

    /// Appends a callback run on every fast-to-slow demotion. An `Err`
    /// aborts the demotion and keeps the key in the fast tier.
    pub fn fast_to_slow(
        mut self,
        callback: impl Fn(&K, &V) -> Result<(), Error> + Send + Sync + 'static,
    ) -> Self {
        self.fast_to_slow.push(Arc::new(callback));
        self
    }

    /// Appends a callback run on every slow-to-fast promotion.
    pub fn slow_to_fast(
        mut self,
        callback: impl Fn(&K, &V) -> Result<(), Error> + Send + Sync + 'static,
    ) -> Self {
        self.slow_to_fast.push(Arc::new(callback));
        self
    }

    /// Sets the demotion error handler.
    pub fn on_evict_error(
        mut self,
        handler: impl Fn(&K, &V, &Error) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.on_evict_error = Some(Arc::new(handler));
        self
    }

    /// Builds a synchronous [`Buffer`].
    pub fn build(self) -> Buffer<K, V, F, S> {
        Buffer::assemble(
            self.fast,
            self.slow,
            self.n,
            self.weight,
            self.fast_to_slow,
            self.slow_to_fast,
            self.on_evict_error,
        )
    }

    /// Builds an [`AsyncBuffer`] with its own single-worker executor.
    pub fn build_async(self) -> AsyncBuffer<K, V, F, S, OffloadExecutor> {
        self.build_async_on(OffloadExecutor::new())
    }

    /// Builds an [`AsyncBuffer`] demoting through the given executor.
    pub fn build_async_on<E: Executor>(self, executor: E) -> AsyncBuffer<K, V, F, S, E> {
        AsyncBuffer::assemble(
            self.fast,
            self.slow,
            self.n,
            self.weight,
            self.fast_to_slow,
            self.slow_to_fast,
            self.on_evict_error,
            executor,
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
