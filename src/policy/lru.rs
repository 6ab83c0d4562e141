//! # Weight-Bounded LRU Layer
//!
//! `Lru` imposes a least-recently-used eviction policy over one child
//! mapping. It stores nothing itself: values live in the child, while the
//! layer tracks per-key weights, a recency queue, and the set of keys whose
//! eviction is currently in flight.
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────────┐
//!   │                          Lru<K, V, M>                             │
//!   │                                                                   │
//!   │   Mutex<LruState>                          child: M               │
//!   │   ┌─────────────────────────────────┐      ┌───────────────────┐  │
//!   │   │ n, offset, total_weight         │      │  values live here │  │
//!   │   │ weights: FxHashMap<K, u64>      │      │  (any Mapping)    │  │
//!   │   │ order:  InsertionSortedSet<K>   │      └───────────────────┘  │
//!   │   │ heavy:  InsertionSortedSet<K>   │                             │
//!   │   │ clean / writing / evicting_now  │      on_evict / on_cache_   │
//!   │   │ paused, closed                  │      evict / on_evict_error │
//!   │   └─────────────────────────────────┘      (run with lock FREE)   │
//!   └───────────────────────────────────────────────────────────────────┘
//!
//!   order:  head ──► [oldest] ◄──► ... ◄──► [newest] ◄── tail
//!   evict:  pick from heavy first, else the head of order
//! ```
//!
//! ## Eviction Protocol
//!
//! ```text
//!   while total_weight + offset > n:
//!     1. under lock: pick victim (heavy first, else oldest), record its
//!        queue neighbors, detach it from order/heavy, mark it in
//!        evicting_now
//!     2. RELEASE the lock
//!     3. read the value from the child, run on_evict (or on_cache_evict
//!        for clean keys) in registration order
//!     4. on callback failure: consult on_evict_error
//!          handled   → proceed with the deletion anyway
//!          unhandled → reinstate the victim at its recorded position,
//!                      re-raise
//!     5. remove from the child; reacquire the lock, drop the weight,
//!        clear evicting_now, wake waiters
//! ```
//!
//! Keys in `evicting_now` are invisible to other evictors; a concurrent
//! `get`/`put`/`remove` on such a key blocks until the in-flight eviction
//! finalizes. Re-entrant calls from inside an eviction callback on the same
//! thread do not block.
//!
//! ## Delayed Eviction
//!
//! [`Lru::pause_evictions`] returns an RAII guard; while at least one guard
//! is alive, `put` and `set_n` only accumulate weight. When the last guard
//! drops, a single eviction pass flushes the backlog. [`Lru::put_noevict`]
//! is the one-shot variant used by tiering layers that want to batch
//! several writes before any demotion runs.
//!
//! ## Key Methods
//!
//! | Method                     | Description                                |
//! |----------------------------|--------------------------------------------|
//! | `get`                      | Child read; bumps recency on success       |
//! | `put` / `put_noevict`      | Child write; evicts / defers eviction      |
//! | `get_all_or_nothing`       | Atomic multi-read; recency untouched on miss |
//! | `evict_until_below_target` | Explicit eviction pass                     |
//! | `pause_evictions`          | Scoped delayed-eviction window             |
//! | `set_n` / `set_offset`     | Runtime budget reconfiguration             |
//! | `mark_clean`               | Route the key's eviction to on_cache_evict |
//! | `touch`                    | Bump recency without reading the value     |
//!
//! ## Invariants
//!
//! At every public-call boundary:
//! - `total_weight` equals the sum of all tracked weights.
//! - The recency queue holds exactly the resident keys minus those in
//!   `evicting_now`.
//! - Outside a delayed-eviction window, `total_weight + offset <= n` unless
//!   a single resident key alone exceeds the budget (evicting the last
//!   resident key is never attempted).

use std::hash::Hash;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, MutexGuard};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ds::InsertionSortedSet;
use crate::error::{BulkError, Error};
use crate::store::hashmap::MapCounters;
use crate::traits::{EvictErrorFn, EvictFn, MapMetrics, Mapping, WeightFn};

/// Weight function used when none is supplied: every pair weighs 1, so `n`
/// bounds the entry count.
pub fn entry_count_weight<K, V>() -> WeightFn<K, V> {
    std::sync::Arc::new(|_, _| 1)
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug)]
struct LruState<K> {
    /// Current weight budget.
    n: u64,
    /// External pressure added to the weight sum; may be negative.
    offset: i64,
    /// Cached sum of `weights` values.
    total_weight: u64,
    weights: FxHashMap<K, u64>,
    /// Recency queue; tail = most recently touched.
    order: InsertionSortedSet<K>,
    /// Keys whose individual weight exceeds `n`; evicted first.
    heavy: InsertionSortedSet<K>,
    /// Keys whose eviction routes to `on_cache_evict`.
    clean: FxHashSet<K>,
    /// Keys reserved by an in-flight `put`/`remove`.
    writing: FxHashSet<K>,
    /// Keys an eviction has chosen, with the evicting thread.
    evicting_now: FxHashMap<K, ThreadId>,
    /// Delayed-eviction depth; evictions run only at zero.
    paused: u32,
    closed: bool,
}

/// A chosen eviction victim together with its pre-eviction queue
/// positions, so an aborted eviction can reinstate it exactly where it
/// was.
struct Victim<K> {
    key: K,
    /// Route the callbacks through the on_cache_evict chain.
    cache_chain: bool,
    /// Next-newer neighbor in the recency queue at pick time.
    order_next: Option<K>,
    /// Next heavy key at pick time, when the victim was heavy.
    heavy_next: Option<K>,
    was_heavy: bool,
}

/// Reinserts `key` ahead of its recorded successor. No successor means the
/// key was the newest (append); a successor that has since been evicted
/// means everything colder is gone (front).
fn restore_position<K: Clone + Eq + Hash>(
    set: &mut InsertionSortedSet<K>,
    key: &K,
    next: &Option<K>,
) {
    match next {
        Some(anchor) => {
            if !set.insert_before(key.clone(), anchor) {
                set.add_front(key.clone());
            }
        }
        None => {
            set.add(key.clone());
        }
    }
}

impl<K: Eq + Hash> LruState<K> {
    fn over_target(&self) -> bool {
        self.total_weight as i128 + self.offset as i128 > self.n as i128
    }

    /// A key with an in-flight state change owned by another thread.
    fn busy(&self, key: &K) -> bool {
        if self.writing.contains(key) {
            return true;
        }
        match self.evicting_now.get(key) {
            Some(owner) => *owner != thread::current().id(),
            None => false,
        }
    }
}

// =============================================================================
// Lru
// =============================================================================

/// LRU policy layer bounding the total weight of a child mapping.
pub struct Lru<K, V, M>
where
    K: 'static,
    V: 'static,
{
    child: M,
    state: Mutex<LruState<K>>,
    /// Signalled whenever an in-flight eviction or write settles.
    settled: Condvar,
    weight: WeightFn<K, V>,
    on_evict: Vec<EvictFn<K, V>>,
    on_cache_evict: Vec<EvictFn<K, V>>,
    on_evict_error: Option<EvictErrorFn<K, V>>,
    counters: MapCounters,
}

impl<K, V, M> Lru<K, V, M>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    M: Mapping<K, V>,
{
    /// Creates an LRU with budget `n` over `child`, counting every entry as
    /// weight 1 and dropping evictees silently.
    ///
    /// Use [`LruBuilder`](crate::builder::LruBuilder) to attach a weight
    /// function and eviction callbacks.
    pub fn new(n: u64, child: M) -> Self {
        Self::assemble(n, child, entry_count_weight(), Vec::new(), Vec::new(), None)
    }

    pub(crate) fn assemble(
        n: u64,
        child: M,
        weight: WeightFn<K, V>,
        on_evict: Vec<EvictFn<K, V>>,
        on_cache_evict: Vec<EvictFn<K, V>>,
        on_evict_error: Option<EvictErrorFn<K, V>>,
    ) -> Self {
        Self {
            child,
            state: Mutex::new(LruState {
                n,
                offset: 0,
                total_weight: 0,
                weights: FxHashMap::default(),
                order: InsertionSortedSet::new(),
                heavy: InsertionSortedSet::new(),
                clean: FxHashSet::default(),
                writing: FxHashSet::default(),
                evicting_now: FxHashMap::default(),
                paused: 0,
                closed: false,
            }),
            settled: Condvar::new(),
            weight,
            on_evict,
            on_cache_evict,
            on_evict_error,
            counters: MapCounters::default(),
        }
    }

    /// Returns the child mapping.
    pub fn child(&self) -> &M {
        &self.child
    }

    /// Returns the current weight budget.
    pub fn n(&self) -> u64 {
        self.state.lock().n
    }

    /// Returns the current weight offset.
    pub fn offset(&self) -> i64 {
        self.state.lock().offset
    }

    /// Returns the cached sum of all tracked weights.
    pub fn total_weight(&self) -> u64 {
        self.state.lock().total_weight
    }

    /// Returns the tracked weight of `key`, if resident.
    pub fn weight_of(&self, key: &K) -> Option<u64> {
        self.state.lock().weights.get(key).copied()
    }

    /// Returns `true` if the tracked weight currently exceeds the budget.
    pub fn over_target(&self) -> bool {
        self.state.lock().over_target()
    }

    /// Returns `true` if the layer has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Updates the weight budget and evicts down to it.
    ///
    /// Inside a delayed-eviction window the new budget is recorded but the
    /// eviction pass is deferred to window exit.
    pub fn set_n(&self, n: u64) -> Result<(), Error> {
        self.set_n_noevict(n)?;
        let run = {
            let st = self.state.lock();
            st.paused == 0 && st.over_target()
        };
        if run {
            self.evict_until_below_target()?;
        }
        Ok(())
    }

    /// Updates the weight budget without evicting.
    ///
    /// The heavy partition is still recomputed; call
    /// [`evict_until_below_target`](Self::evict_until_below_target) (or let
    /// a background pass run) to enforce the new budget.
    pub fn set_n_noevict(&self, n: u64) -> Result<(), Error> {
        let mut st = self.state.lock();
        if st.closed {
            return Err(Error::AlreadyClosed);
        }
        st.n = n;
        let heavy_keys: Vec<K> = st
            .order
            .iter()
            .filter(|key| st.weights.get(*key).copied().unwrap_or(0) > n)
            .cloned()
            .collect();
        st.heavy = heavy_keys.into_iter().collect();
        Ok(())
    }

    /// Updates the weight offset without evicting.
    pub fn set_offset_noevict(&self, offset: i64) -> Result<(), Error> {
        let mut st = self.state.lock();
        if st.closed {
            return Err(Error::AlreadyClosed);
        }
        st.offset = offset;
        Ok(())
    }

    /// Updates the weight offset and evicts down to the budget.
    ///
    /// Unlike [`set_n`](Self::set_n) this does not change which keys
    /// qualify as heavy.
    pub fn set_offset(&self, offset: i64) -> Result<(), Error> {
        self.set_offset_noevict(offset)?;
        let run = {
            let st = self.state.lock();
            st.paused == 0 && st.over_target()
        };
        if run {
            self.evict_until_below_target()?;
        }
        Ok(())
    }

    /// Bumps `key` to most-recently-used without reading its value.
    ///
    /// Returns `false` if the key is absent, closed over, or mid-eviction.
    pub fn touch(&self, key: &K) -> bool {
        let mut st = self.state.lock();
        if st.closed
            || st.busy(key)
            || st.evicting_now.contains_key(key)
            || !st.weights.contains_key(key)
        {
            return false;
        }
        st.order.discard(key);
        st.order.add(key.clone());
        true
    }

    /// Flags `key` so its eviction fires `on_cache_evict` instead of
    /// `on_evict`.
    ///
    /// Used by owners that know the key's value is already safe elsewhere,
    /// e.g. a read-through cache whose backing store still holds it. A
    /// later `put` clears the flag. Returns `false` if the key is not
    /// resident.
    pub fn mark_clean(&self, key: &K) -> bool {
        let mut st = self.state.lock();
        if st.closed || !st.weights.contains_key(key) {
            return false;
        }
        st.clean.insert(key.clone());
        true
    }

    /// Inserts without triggering an eviction pass.
    ///
    /// The weight is still recorded; call
    /// [`evict_until_below_target`](Self::evict_until_below_target) once a
    /// batch of writes has been committed.
    pub fn put_noevict(&self, key: K, value: V) -> Result<(), Error> {
        self.put_impl(key, value, false)
    }

    /// Opens a delayed-eviction window.
    ///
    /// While any guard is alive, `put` and `set_n` accumulate weight
    /// without evicting. When the last guard drops, one eviction pass runs;
    /// errors from that pass go through `on_evict_error`, and an unhandled
    /// error leaves the remaining keys resident. Call
    /// [`evict_until_below_target`](Self::evict_until_below_target)
    /// explicitly when the error itself is needed.
    pub fn pause_evictions(&self) -> EvictionPause<'_, K, V, M> {
        self.state.lock().paused += 1;
        EvictionPause { lru: self }
    }

    /// Fetches every requested key or none of them.
    ///
    /// On success each requested key's recency is bumped exactly once, in
    /// request order. On failure ([`BulkError::NotFoundAny`] carrying the
    /// absent subset) recency is untouched for every key. Keys mid-eviction
    /// count as absent.
    pub fn get_all_or_nothing(&self, keys: &[K]) -> Result<Vec<(K, V)>, BulkError<K>> {
        {
            let st = self.state.lock();
            if st.closed {
                return Err(BulkError::Op(Error::AlreadyClosed));
            }
            let missing: Vec<K> = keys
                .iter()
                .filter(|key| {
                    !st.weights.contains_key(*key) || st.evicting_now.contains_key(*key)
                })
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BulkError::NotFoundAny(missing));
            }
        }

        let mut found = Vec::with_capacity(keys.len());
        let mut missing = Vec::new();
        for key in keys {
            match self.child.get(key) {
                Ok(value) => found.push((key.clone(), value)),
                Err(Error::NotFound) => missing.push(key.clone()),
                Err(err) => return Err(BulkError::Op(err)),
            }
        }
        if !missing.is_empty() {
            // A concurrent removal won the race; leave recency untouched.
            return Err(BulkError::NotFoundAny(missing));
        }

        let mut st = self.state.lock();
        let mut bumped = FxHashSet::default();
        for key in keys {
            if bumped.insert(key.clone())
                && st.weights.contains_key(key)
                && !st.evicting_now.contains_key(key)
            {
                st.order.discard(key);
                st.order.add(key.clone());
            }
        }
        drop(st);
        for _ in keys {
            self.counters.inc_hit();
        }
        Ok(found)
    }

    /// Evicts until `total_weight + offset <= n` or no further victim is
    /// eligible.
    ///
    /// Victims come from the heavy set first (oldest heavy key), then the
    /// head of the recency queue. The pass stops early when the layer is
    /// closed, a delayed-eviction window is open, or only one resident key
    /// remains (a lone over-budget key stays resident, best-effort).
    pub fn evict_until_below_target(&self) -> Result<(), Error> {
        loop {
            let victim = {
                let mut st = self.state.lock();
                if st.closed || st.paused > 0 || !st.over_target() {
                    return Ok(());
                }
                if st.weights.len().saturating_sub(st.evicting_now.len()) <= 1 {
                    return Ok(());
                }
                let candidate = st
                    .heavy
                    .iter()
                    .find(|key| !st.evicting_now.contains_key(*key) && !st.writing.contains(*key))
                    .cloned()
                    .or_else(|| {
                        st.order
                            .iter()
                            .find(|key| {
                                !st.evicting_now.contains_key(*key) && !st.writing.contains(*key)
                            })
                            .cloned()
                    });
                let Some(key) = candidate else {
                    return Ok(());
                };
                let was_heavy = st.heavy.contains(&key);
                let victim = Victim {
                    cache_chain: st.clean.contains(&key),
                    order_next: st.order.next_after(&key).cloned(),
                    heavy_next: if was_heavy {
                        st.heavy.next_after(&key).cloned()
                    } else {
                        None
                    },
                    was_heavy,
                    key,
                };
                st.order.discard(&victim.key);
                st.heavy.discard(&victim.key);
                st.evicting_now
                    .insert(victim.key.clone(), thread::current().id());
                victim
            };

            let value = match self.child.get(&victim.key) {
                Ok(value) => value,
                Err(Error::NotFound) => {
                    // The child lost the key underneath us; just drop the
                    // bookkeeping and keep going.
                    self.finalize_eviction(&victim.key, false);
                    continue;
                }
                Err(err) => {
                    self.abort_eviction(&victim);
                    return Err(err);
                }
            };

            let chain = if victim.cache_chain {
                &self.on_cache_evict
            } else {
                &self.on_evict
            };
            let mut failure = None;
            for callback in chain {
                if let Err(err) = callback(&victim.key, &value) {
                    failure = Some(err);
                    break;
                }
            }

            if let Some(err) = failure {
                let handled = match &self.on_evict_error {
                    Some(handler) => handler(&victim.key, &value, &err),
                    None => false,
                };
                if !handled {
                    self.abort_eviction(&victim);
                    return Err(err);
                }
            }

            match self.child.remove(&victim.key) {
                Ok(_) | Err(Error::NotFound) => {}
                Err(err) => {
                    self.abort_eviction(&victim);
                    return Err(err);
                }
            }
            self.finalize_eviction(&victim.key, true);
        }
    }

    /// Reinstates an eviction victim at its pre-eviction queue position, so
    /// a failed eviction leaves recency unchanged.
    fn abort_eviction(&self, victim: &Victim<K>) {
        let mut st = self.state.lock();
        st.evicting_now.remove(&victim.key);
        if st.weights.contains_key(&victim.key) {
            restore_position(&mut st.order, &victim.key, &victim.order_next);
            if victim.was_heavy {
                restore_position(&mut st.heavy, &victim.key, &victim.heavy_next);
            }
        }
        drop(st);
        self.settled.notify_all();
    }

    fn finalize_eviction(&self, key: &K, evicted: bool) {
        let mut st = self.state.lock();
        st.evicting_now.remove(key);
        if let Some(weight) = st.weights.remove(key) {
            st.total_weight -= weight;
        }
        st.clean.remove(key);
        drop(st);
        self.settled.notify_all();
        if evicted {
            self.counters.inc_eviction();
        }
    }

    /// Blocks until `key` has no in-flight eviction or write, then returns.
    ///
    /// Used by tiering layers to order their own bookkeeping after a
    /// pending demotion of the key.
    pub(crate) fn wait_settled(&self, key: &K) -> Result<(), Error> {
        let _st = self.lock_waiting(key)?;
        Ok(())
    }

    /// Locks the state, waiting until `key` has no in-flight state change
    /// owned by another thread.
    fn lock_waiting(&self, key: &K) -> Result<MutexGuard<'_, LruState<K>>, Error> {
        let mut st = self.state.lock();
        loop {
            if st.closed {
                return Err(Error::AlreadyClosed);
            }
            if !st.busy(key) {
                return Ok(st);
            }
            self.settled.wait(&mut st);
        }
    }

    fn put_impl(&self, key: K, value: V, evict_after: bool) -> Result<(), Error> {
        // Weight is user code; keep it outside the lock.
        let weight = (self.weight)(&key, &value);
        {
            let mut st = self.lock_waiting(&key)?;
            st.writing.insert(key.clone());
        }

        let result = self.child.put(key.clone(), value);

        let run_evict = {
            let mut st = self.state.lock();
            st.writing.remove(&key);
            match result {
                Err(err) => {
                    // Bookkeeping was never touched; releasing the
                    // reservation restores the pre-call state exactly.
                    drop(st);
                    self.settled.notify_all();
                    return Err(err);
                }
                Ok(()) => {
                    match st.weights.insert(key.clone(), weight) {
                        Some(old) => {
                            st.total_weight -= old;
                            self.counters.inc_update();
                        }
                        None => self.counters.inc_insert(),
                    }
                    st.total_weight += weight;
                    st.order.discard(&key);
                    st.order.add(key.clone());
                    if weight > st.n {
                        st.heavy.add(key.clone());
                    } else {
                        st.heavy.discard(&key);
                    }
                    st.clean.remove(&key);
                    evict_after && st.paused == 0 && st.over_target()
                }
            }
        };
        self.settled.notify_all();

        if run_evict {
            self.evict_until_below_target()?;
        }
        Ok(())
    }
}

impl<K, V, M> Mapping<K, V> for Lru<K, V, M>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    M: Mapping<K, V>,
{
    /// Reads through to the child and bumps recency on success. This is the
    /// only access path that updates recency.
    fn get(&self, key: &K) -> Result<V, Error> {
        {
            let _st = self.lock_waiting(key)?;
        }
        match self.child.get(key) {
            Ok(value) => {
                let mut st = self.state.lock();
                // A key that entered eviction since the child read is
                // detached from the queue; do not resurrect it.
                if st.weights.contains_key(key) && !st.evicting_now.contains_key(key) {
                    st.order.discard(key);
                    st.order.add(key.clone());
                }
                drop(st);
                self.counters.inc_hit();
                Ok(value)
            }
            Err(err) => {
                if err.is_not_found() {
                    self.counters.inc_miss();
                }
                Err(err)
            }
        }
    }

    fn put(&self, key: K, value: V) -> Result<(), Error> {
        self.put_impl(key, value, true)
    }

    fn remove(&self, key: &K) -> Result<V, Error> {
        {
            let mut st = self.lock_waiting(key)?;
            st.writing.insert(key.clone());
        }

        let result = self.child.remove(key);

        let mut st = self.state.lock();
        st.writing.remove(key);
        match &result {
            Ok(_) | Err(Error::NotFound) => {
                if let Some(weight) = st.weights.remove(key) {
                    st.total_weight -= weight;
                }
                st.order.discard(key);
                st.heavy.discard(key);
                st.clean.remove(key);
            }
            Err(_) => {}
        }
        drop(st);
        self.settled.notify_all();

        if result.is_ok() {
            self.counters.inc_remove();
        }
        result
    }

    fn contains(&self, key: &K) -> Result<bool, Error> {
        let st = self.state.lock();
        if st.closed {
            return Err(Error::AlreadyClosed);
        }
        Ok(st.weights.contains_key(key))
    }

    fn len(&self) -> usize {
        let st = self.state.lock();
        if st.closed {
            return 0;
        }
        st.weights.len()
    }

    /// Key snapshot in recency order (oldest first), with keys mid-eviction
    /// appended at the end.
    fn keys(&self) -> Result<Vec<K>, Error> {
        let st = self.state.lock();
        if st.closed {
            return Err(Error::AlreadyClosed);
        }
        let mut keys: Vec<K> = st.order.iter().cloned().collect();
        for key in st.evicting_now.keys() {
            if st.weights.contains_key(key) {
                keys.push(key.clone());
            }
        }
        Ok(keys)
    }

    fn close(&self) -> Result<(), Error> {
        let mut st = self.state.lock();
        st.closed = true;
        drop(st);
        // Wake blocked waiters so they observe the closed flag.
        self.settled.notify_all();
        Ok(())
    }

    fn metrics(&self) -> MapMetrics {
        self.counters.snapshot()
    }

    /// Bulk reads are all-or-nothing: see
    /// [`get_all_or_nothing`](Self::get_all_or_nothing).
    fn get_many(&self, keys: &[K]) -> Result<Vec<(K, V)>, BulkError<K>> {
        self.get_all_or_nothing(keys)
    }
}

// =============================================================================
// EvictionPause
// =============================================================================

/// RAII guard for a delayed-eviction window; see
/// [`Lru::pause_evictions`].
pub struct EvictionPause<'a, K, V, M>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    M: Mapping<K, V>,
{
    lru: &'a Lru<K, V, M>,
}

impl<K, V, M> Drop for EvictionPause<'_, K, V, M>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    M: Mapping<K, V>,
{
    fn drop(&mut self) {
        let resume = {
            let mut st = self.lru.state.lock();
            st.paused -= 1;
            st.paused == 0
        };
        if resume {
            // Unhandled callback errors leave the remaining keys resident;
            // callers needing the error call evict_until_below_target.
            let _ = self.lru.evict_until_below_target();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
