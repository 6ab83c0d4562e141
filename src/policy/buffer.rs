//! # Two-Tier Buffer Layer
//!
//! `Buffer` combines two mappings into one: a `fast` tier governed by an
//! internal weight-bounded [`Lru`], and a `slow` tier that absorbs its
//! overflow. Writes land in `fast`; when the LRU budget is exceeded, the
//! coldest keys are *demoted* to `slow`, and a read that misses `fast` but
//! hits `slow` *promotes* the key back (possibly demoting others in turn).
//!
//! ## Architecture
//!
//! ```text
//!                       put(k, v)            get(k)
//!                          │                    │
//!                          ▼                    ▼
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                        Buffer<K, V, F, S>                        │
//!   │                                                                  │
//!   │   ┌───────────────────────────┐      demotion (on_evict)         │
//!   │   │   Lru(n, fast: F)         │ ───────────────────────────┐     │
//!   │   │   values of hot keys      │                            ▼     │
//!   │   └───────────────────────────┘      ┌──────────────────────┐    │
//!   │                ▲                     │      slow: S         │    │
//!   │                │     promotion      │  values of cold keys │    │
//!   │                └─────────────────────└──────────────────────┘    │
//!   │                                                                  │
//!   │   keys: unified insertion-ordered key set (len / iteration)      │
//!   │   cancel_restore: in-flight promotions a writer may abandon      │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariant
//!
//! No key is present in both tiers at once. Demotion writes `slow` before
//! the LRU removes the key from `fast`; promotion writes `fast` before
//! deleting from `slow`, both under the buffer lock, so the overlap is
//! never observable through the buffer itself.
//!
//! ## Write/Promotion Race
//!
//! A `put` racing an in-flight promotion of the same key flags the
//! promotion for cancellation (`cancel_restore`); the promotion observes
//! the flag after its slow-tier read and abandons the restore, so the
//! writer's value wins.
//!
//! ## Heavy Values
//!
//! A slow-tier hit whose weight exceeds the LRU budget is served directly
//! from `slow` without promotion: moving it would only bounce it straight
//! back.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::ds::InsertionSortedSet;
use crate::error::Error;
use crate::policy::lru::{entry_count_weight, Lru};
use crate::traits::{EvictErrorFn, EvictFn, MapMetrics, Mapping, WeightFn};

/// Two-tier mapping with LRU-driven demotion and read-through promotion.
pub struct Buffer<K, V, F, S>
where
    K: 'static,
    V: 'static,
{
    lru: Lru<K, V, F>,
    slow: Arc<S>,
    weight: WeightFn<K, V>,
    slow_to_fast_callbacks: Vec<EvictFn<K, V>>,
    /// In-flight promotions; a racing writer flips the flag to `true` to
    /// make the promotion abandon its restore.
    cancel_restore: Mutex<FxHashMap<K, bool>>,
    /// Unified key set across both tiers, in insertion order.
    keys: Mutex<InsertionSortedSet<K>>,
    closed: AtomicBool,
}

impl<K, V, F, S> Buffer<K, V, F, S>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Mapping<K, V> + 'static,
    S: Mapping<K, V> + 'static,
{
    /// Creates a buffer with weight budget `n` on the fast tier, counting
    /// every entry as weight 1.
    ///
    /// Use [`BufferBuilder`](crate::builder::BufferBuilder) to attach a
    /// weight function and tier-transition callbacks.
    pub fn new(fast: F, slow: S, n: u64) -> Self {
        Self::assemble(
            fast,
            slow,
            n,
            entry_count_weight(),
            Vec::new(),
            Vec::new(),
            None,
        )
    }

    pub(crate) fn assemble(
        fast: F,
        slow: S,
        n: u64,
        weight: WeightFn<K, V>,
        fast_to_slow_callbacks: Vec<EvictFn<K, V>>,
        slow_to_fast_callbacks: Vec<EvictFn<K, V>>,
        on_evict_error: Option<EvictErrorFn<K, V>>,
    ) -> Self {
        let slow = Arc::new(slow);

        // Demotion: write the evictee to slow, then run the user's
        // fast-to-slow callbacks. A callback failure undoes the slow write
        // so the LRU can keep the key resident in fast.
        let demote_slow = Arc::clone(&slow);
        let demote: EvictFn<K, V> = Arc::new(move |key: &K, value: &V| {
            demote_slow.put(key.clone(), value.clone())?;
            for callback in &fast_to_slow_callbacks {
                if let Err(err) = callback(key, value) {
                    let _ = demote_slow.remove(key);
                    return Err(err);
                }
            }
            Ok(())
        });

        // The same demotion backs both eviction chains: with the tiers
        // disjoint there is never a slow-side copy that would make a pure
        // drop safe, so a clean-marked key demotes like any other and
        // stays retrievable.
        Self {
            lru: Lru::assemble(
                n,
                fast,
                Arc::clone(&weight),
                vec![Arc::clone(&demote)],
                vec![demote],
                on_evict_error,
            ),
            slow,
            weight,
            slow_to_fast_callbacks,
            cancel_restore: Mutex::new(FxHashMap::default()),
            keys: Mutex::new(InsertionSortedSet::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the internal LRU over the fast tier.
    pub fn fast(&self) -> &Lru<K, V, F> {
        &self.lru
    }

    /// Returns the slow tier.
    pub fn slow(&self) -> &S {
        &self.slow
    }

    /// Maximum fast-tier weight before demotion starts.
    pub fn n(&self) -> u64 {
        self.lru.n()
    }

    /// Updates the fast-tier budget and demotes down to it.
    pub fn set_n(&self, n: u64) -> Result<(), Error> {
        self.lru.set_n(n)
    }

    /// Weight offset applied to the fast tier.
    pub fn offset(&self) -> i64 {
        self.lru.offset()
    }

    /// The weight function shared with the internal LRU.
    pub fn weight(&self) -> &WeightFn<K, V> {
        &self.weight
    }

    /// Updates the fast-tier weight offset and demotes down to the budget.
    pub fn set_offset(&self, offset: i64) -> Result<(), Error> {
        self.lru.set_offset(offset)
    }

    /// Runs a demotion pass on the fast tier.
    pub fn evict_until_below_target(&self) -> Result<(), Error> {
        self.lru.evict_until_below_target()
    }

    /// Returns `true` if the buffer has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Writes to the fast tier without triggering demotion.
    ///
    /// Lets a caller commit a batch of writes before any flush happens;
    /// follow with [`evict_until_below_target`](Self::evict_until_below_target).
    pub fn set_noevict(&self, key: K, value: V) -> Result<(), Error> {
        self.check_open()?;
        let mut restores = self.cancel_restore.lock();
        if let Some(flag) = restores.get_mut(&key) {
            // The writer's value wins over the in-flight promotion.
            *flag = true;
        }
        // Order after any pending demotion of this key, then drop the
        // demoted copy so the tiers stay disjoint.
        self.lru.wait_settled(&key)?;
        match self.slow.remove(&key) {
            Ok(_) | Err(Error::NotFound) => {}
            Err(err) => return Err(err),
        }
        self.lru.put_noevict(key.clone(), value)?;
        self.keys.lock().add(key);
        drop(restores);
        Ok(())
    }

    /// Moves `key` from the slow tier into the fast tier and returns its
    /// value.
    fn slow_to_fast(&self, key: &K) -> Result<V, Error> {
        self.cancel_restore.lock().insert(key.clone(), false);

        // The slow read may block on external resources; keep it outside
        // the buffer lock.
        let value = match self.slow.get(key) {
            Ok(value) => value,
            Err(err) => {
                self.cancel_restore.lock().remove(key);
                return Err(err);
            }
        };

        {
            let mut restores = self.cancel_restore.lock();
            let cancelled = restores.remove(key) == Some(true);
            if cancelled {
                drop(restores);
                // A writer replaced the key mid-promotion; serve its value.
                return self.lru.get(key);
            }

            // Avoid useless movement for values heavier than the budget.
            let weight = (self.weight)(key, &value);
            if weight <= self.lru.n() {
                self.lru.put_noevict(key.clone(), value.clone())?;
                match self.slow.remove(key) {
                    Ok(_) | Err(Error::NotFound) => {}
                    Err(err) => return Err(err),
                }
            }
        }

        // The promotion may have pushed the fast tier over budget; demote
        // outside the buffer lock.
        self.lru.evict_until_below_target()?;
        for callback in &self.slow_to_fast_callbacks {
            callback(key, &value)?;
        }
        Ok(value)
    }

    fn check_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            Err(Error::AlreadyClosed)
        } else {
            Ok(())
        }
    }
}

impl<K, V, F, S> Mapping<K, V> for Buffer<K, V, F, S>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Mapping<K, V> + 'static,
    S: Mapping<K, V> + 'static,
{
    /// Fast-tier hit returns directly (recency recorded by the LRU); a
    /// slow-tier hit promotes the key.
    fn get(&self, key: &K) -> Result<V, Error> {
        self.check_open()?;
        if !self.keys.lock().contains(key) {
            return Err(Error::NotFound);
        }
        match self.lru.get(key) {
            Ok(value) => Ok(value),
            Err(Error::NotFound) => self.slow_to_fast(key),
            Err(err) => Err(err),
        }
    }

    fn put(&self, key: K, value: V) -> Result<(), Error> {
        self.set_noevict(key, value)?;
        self.lru.evict_until_below_target()
    }

    /// Removes the key from whichever tier holds it.
    fn remove(&self, key: &K) -> Result<V, Error> {
        self.check_open()?;
        let mut restores = self.cancel_restore.lock();
        if let Some(flag) = restores.get_mut(key) {
            *flag = true;
        }
        let result = match self.lru.remove(key) {
            Ok(value) => {
                match self.slow.remove(key) {
                    Ok(_) | Err(Error::NotFound) => {}
                    Err(err) => return Err(err),
                }
                Ok(value)
            }
            Err(Error::NotFound) => self.slow.remove(key),
            Err(err) => Err(err),
        };
        if result.is_ok() {
            self.keys.lock().discard(key);
        }
        drop(restores);
        result
    }

    fn contains(&self, key: &K) -> Result<bool, Error> {
        self.check_open()?;
        Ok(self.keys.lock().contains(key))
    }

    fn len(&self) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.keys.lock().len()
    }

    /// Unified key snapshot across both tiers, in insertion order.
    fn keys(&self) -> Result<Vec<K>, Error> {
        self.check_open()?;
        Ok(self.keys.lock().iter().cloned().collect())
    }

    /// Closes the buffer and its internal LRU bookkeeping. The fast and
    /// slow tier mappings remain open; the user composes their shutdown.
    fn close(&self) -> Result<(), Error> {
        self.closed.store(true, Ordering::Release);
        self.lru.close()
    }

    /// Fast-tier activity counters.
    fn metrics(&self) -> MapMetrics {
        self.lru.metrics()
    }
}

// =============================================================================
// Tests
// =============================================================================
