//! # Buffer with Background Demotion
//!
//! `AsyncBuffer` has the same contract as [`Buffer`], with two differences:
//!
//! 1. Demotions to the slow tier run on an [`Executor`] instead of the
//!    writing thread. A `put` that pushes the fast tier over budget
//!    returns immediately; a background pass moves the coldest keys out.
//! 2. Readers block only on the keys they need: `get(k)` waits for `k`'s
//!    pending demotion (if any) to finalize, not for the whole pass, and
//!    [`async_get`](AsyncBuffer::async_get) assembles a whole batch off
//!    the calling thread.
//!
//! ## Data Flow
//!
//! ```text
//!    put(k, v) ──► fast tier ──► over budget? ──► schedule pass ─┐
//!                                                               │ executor
//!                                                               ▼
//!                                            evict_until_below_target()
//!                                               │ per-victim demotion
//!                                               ▼
//!                                            slow tier
//!
//!    get(k)    ──► wait k's pending demotion ──► fast hit? ──► done
//!                                               └─ miss ──► promote from slow
//!
//!    async_get(ks) ─► all in fast? ─► ready handle (recency bumped once)
//!                     └─ else ─► worker: wait per key, read slow
//!                                WITHOUT promoting, send result
//! ```
//!
//! ## Failure and Cancellation
//!
//! A demotion failure is reported through `on_evict_error` exactly once.
//! If the handler does not claim it, the key stays resident in fast and
//! its recency is reinstated at the hot end, as if it had just been
//! written. Closing the buffer stops the in-flight pass at the next
//! victim boundary and cancels queued work; a [`FetchHandle`] whose task
//! was cancelled reports [`Error::Cancelled`].

use std::hash::Hash;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BulkError, Error};
use crate::offload::{Executor, OffloadExecutor};
use crate::policy::buffer::Buffer;
use crate::policy::lru::entry_count_weight;
use crate::traits::{EvictErrorFn, EvictFn, MapMetrics, Mapping, WeightFn};

/// What a batched read does about keys that are absent from both tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Fail the batch with [`BulkError::NotFoundAny`].
    Raise,
    /// Return a result with fewer pairs than requested keys.
    Omit,
}

/// Buffer variant whose slow-tier writes proceed on a background executor.
pub struct AsyncBuffer<K, V, F, S, E = OffloadExecutor>
where
    K: 'static,
    V: 'static,
{
    buffer: Arc<Buffer<K, V, F, S>>,
    executor: E,
    /// Budget target of the in-flight background pass, if one is running.
    evicting: Arc<Mutex<Option<u64>>>,
    /// Victims whose demotion failed unhandled; the pass reinstates their
    /// recency at the hot end before finishing.
    failed: Arc<Mutex<Vec<K>>>,
}

impl<K, V, F, S> AsyncBuffer<K, V, F, S, OffloadExecutor>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Mapping<K, V> + 'static,
    S: Mapping<K, V> + 'static,
{
    /// Creates an async buffer with its own single-worker executor.
    ///
    /// Use [`BufferBuilder`](crate::builder::BufferBuilder) to attach a
    /// weight function, callbacks, or a custom executor.
    pub fn new(fast: F, slow: S, n: u64) -> Self {
        Self::assemble(
            fast,
            slow,
            n,
            entry_count_weight(),
            Vec::new(),
            Vec::new(),
            None,
            OffloadExecutor::new(),
        )
    }
}

impl<K, V, F, S, E> AsyncBuffer<K, V, F, S, E>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Mapping<K, V> + 'static,
    S: Mapping<K, V> + 'static,
    E: Executor,
{
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        fast: F,
        slow: S,
        n: u64,
        weight: WeightFn<K, V>,
        fast_to_slow_callbacks: Vec<EvictFn<K, V>>,
        slow_to_fast_callbacks: Vec<EvictFn<K, V>>,
        on_evict_error: Option<EvictErrorFn<K, V>>,
        executor: E,
    ) -> Self {
        let failed: Arc<Mutex<Vec<K>>> = Arc::new(Mutex::new(Vec::new()));

        // Record unhandled failures so the background pass can reinstate
        // the victims' recency once the LRU has restored them.
        let sink = Arc::clone(&failed);
        let wrapper: EvictErrorFn<K, V> = Arc::new(move |key: &K, value: &V, err: &Error| {
            let handled = match &on_evict_error {
                Some(handler) => handler(key, value, err),
                None => false,
            };
            if !handled {
                sink.lock().push(key.clone());
            }
            handled
        });

        Self {
            buffer: Arc::new(Buffer::assemble(
                fast,
                slow,
                n,
                weight,
                fast_to_slow_callbacks,
                slow_to_fast_callbacks,
                Some(wrapper),
            )),
            executor,
            evicting: Arc::new(Mutex::new(None)),
            failed,
        }
    }

    /// Returns the underlying buffer.
    pub fn buffer(&self) -> &Buffer<K, V, F, S> {
        &self.buffer
    }

    /// Returns the internal LRU over the fast tier.
    pub fn fast(&self) -> &crate::policy::lru::Lru<K, V, F> {
        self.buffer.fast()
    }

    /// Returns the slow tier.
    pub fn slow(&self) -> &S {
        self.buffer.slow()
    }

    /// Maximum fast-tier weight before background demotion starts.
    pub fn n(&self) -> u64 {
        self.buffer.n()
    }

    /// Updates the fast-tier budget; enforcement happens in the background.
    pub fn set_n(&self, n: u64) -> Result<(), Error> {
        self.buffer.fast().set_n_noevict(n)?;
        self.async_evict_until_below_target();
        Ok(())
    }

    /// Weight offset applied to the fast tier.
    pub fn offset(&self) -> i64 {
        self.buffer.offset()
    }

    /// The weight function shared with the internal LRU.
    pub fn weight(&self) -> &WeightFn<K, V> {
        self.buffer.weight()
    }

    /// Updates the fast-tier offset; enforcement happens in the background.
    pub fn set_offset(&self, offset: i64) -> Result<(), Error> {
        self.buffer.fast().set_offset_noevict(offset)?;
        self.async_evict_until_below_target();
        Ok(())
    }

    /// Returns `true` while a background demotion pass is in flight.
    pub fn eviction_in_flight(&self) -> bool {
        self.evicting.lock().is_some()
    }

    /// Starts a background demotion pass if the fast tier is over budget
    /// and no pass is already running.
    pub fn async_evict_until_below_target(&self) {
        let mut evicting = self.evicting.lock();
        if evicting.is_some() {
            // The running pass re-checks the weight before it finishes.
            return;
        }
        let lru = self.buffer.fast();
        if lru.is_closed() || !lru.over_target() {
            return;
        }
        *evicting = Some(lru.n());
        drop(evicting);

        let buffer = Arc::clone(&self.buffer);
        let slot = Arc::clone(&self.evicting);
        let failed = Arc::clone(&self.failed);
        self.executor.execute(Box::new(move || {
            loop {
                let result = buffer.fast().evict_until_below_target();

                // Reinstate unhandled failures at the hot end, as if they
                // had just been written.
                let victims: Vec<K> = std::mem::take(&mut *failed.lock());
                for key in &victims {
                    buffer.fast().touch(key);
                }

                let mut slot = slot.lock();
                let done = result.is_err()
                    || buffer.fast().is_closed()
                    || !buffer.fast().over_target();
                if done {
                    *slot = None;
                    return;
                }
                // Writes landed while the pass was finishing; go again
                // while still holding the scheduling slot.
            }
        }));
    }

    /// Fetches a batch of keys, offloading slow-tier reads.
    ///
    /// Resolves immediately when every key is in the fast tier (bumping
    /// recency once per key, only in that case). Otherwise a background
    /// task waits out pending demotions and reads the stragglers directly
    /// from the slow tier *without promoting them*: pulling them into fast
    /// could demote the very keys the batch just fetched. Promotion is
    /// deferred to later single-key reads.
    pub fn async_get(&self, keys: Vec<K>, missing: MissingPolicy) -> FetchHandle<K, V> {
        if self.buffer.is_closed() {
            return FetchHandle::ready(Err(BulkError::Op(Error::AlreadyClosed)));
        }

        // Presence screen: avoid spawning work for keys absent everywhere.
        let keys: Vec<K> = match missing {
            MissingPolicy::Omit => keys
                .into_iter()
                .filter(|key| self.buffer.contains(key).unwrap_or(false))
                .collect(),
            MissingPolicy::Raise => {
                let absent: Vec<K> = keys
                    .iter()
                    .filter(|key| !self.buffer.contains(key).unwrap_or(false))
                    .cloned()
                    .collect();
                if !absent.is_empty() {
                    return FetchHandle::ready(Err(BulkError::NotFoundAny(absent)));
                }
                keys
            }
        };

        // Do not pull keys towards the hot end unless all are available.
        match self.buffer.fast().get_all_or_nothing(&keys) {
            Ok(items) => return FetchHandle::ready(Ok(items)),
            Err(BulkError::NotFoundAny(_)) => {}
            Err(err) => return FetchHandle::ready(Err(err)),
        }

        let (tx, rx) = mpsc::channel();
        let buffer = Arc::clone(&self.buffer);
        self.executor.execute(Box::new(move || {
            let _ = tx.send(assemble_batch(&buffer, &keys, missing));
        }));
        FetchHandle::pending(rx)
    }
}

fn assemble_batch<K, V, F, S>(
    buffer: &Buffer<K, V, F, S>,
    keys: &[K],
    missing: MissingPolicy,
) -> Result<Vec<(K, V)>, BulkError<K>>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Mapping<K, V> + 'static,
    S: Mapping<K, V> + 'static,
{
    let mut found = Vec::with_capacity(keys.len());
    let mut absent = Vec::new();
    for key in keys {
        if buffer.fast().is_closed() {
            return Err(BulkError::Op(Error::Cancelled));
        }
        // The fast read waits out a pending demotion of this key; a
        // subsequent miss means the value is now in slow.
        match buffer.fast().get(key) {
            Ok(value) => found.push((key.clone(), value)),
            Err(Error::NotFound) => match buffer.slow().get(key) {
                Ok(value) => found.push((key.clone(), value)),
                Err(Error::NotFound) => absent.push(key.clone()),
                Err(err) => return Err(BulkError::Op(err)),
            },
            Err(Error::AlreadyClosed) => return Err(BulkError::Op(Error::Cancelled)),
            Err(err) => return Err(BulkError::Op(err)),
        }
    }
    if missing == MissingPolicy::Raise && !absent.is_empty() {
        // The key was present when async_get was called but a racing
        // removal won; report it like any other bulk miss.
        return Err(BulkError::NotFoundAny(absent));
    }
    Ok(found)
}

impl<K, V, F, S, E> Mapping<K, V> for AsyncBuffer<K, V, F, S, E>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Mapping<K, V> + 'static,
    S: Mapping<K, V> + 'static,
    E: Executor,
{
    /// Blocks only until this key's pending demotion (if any) completes,
    /// then behaves as `Buffer::get`.
    fn get(&self, key: &K) -> Result<V, Error> {
        self.buffer.get(key)
    }

    /// Writes to the fast tier immediately; demotion runs in the
    /// background if the write pushed the tier over budget.
    fn put(&self, key: K, value: V) -> Result<(), Error> {
        self.buffer.set_noevict(key, value)?;
        self.async_evict_until_below_target();
        Ok(())
    }

    fn remove(&self, key: &K) -> Result<V, Error> {
        self.buffer.remove(key)
    }

    fn contains(&self, key: &K) -> Result<bool, Error> {
        self.buffer.contains(key)
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn keys(&self) -> Result<Vec<K>, Error> {
        self.buffer.keys()
    }

    /// Closes the buffer, stops the in-flight pass at its next victim
    /// boundary, and cancels queued background work. Tier mappings remain
    /// open.
    fn close(&self) -> Result<(), Error> {
        self.buffer.close()?;
        self.executor.shutdown();
        Ok(())
    }

    fn metrics(&self) -> MapMetrics {
        self.buffer.metrics()
    }
}

// =============================================================================
// FetchHandle
// =============================================================================

/// Result handle for [`AsyncBuffer::async_get`].
///
/// Already-resolved batches (every key was in the fast tier) carry their
/// result inline; offloaded batches carry the worker's channel.
pub struct FetchHandle<K, V> {
    inner: HandleInner<K, V>,
}

enum HandleInner<K, V> {
    Ready(Result<Vec<(K, V)>, BulkError<K>>),
    Pending(Receiver<Result<Vec<(K, V)>, BulkError<K>>>),
}

impl<K, V> FetchHandle<K, V> {
    fn ready(result: Result<Vec<(K, V)>, BulkError<K>>) -> Self {
        Self {
            inner: HandleInner::Ready(result),
        }
    }

    fn pending(receiver: Receiver<Result<Vec<(K, V)>, BulkError<K>>>) -> Self {
        Self {
            inner: HandleInner::Pending(receiver),
        }
    }

    /// Returns `true` if the batch resolved without background work.
    pub fn is_ready(&self) -> bool {
        matches!(self.inner, HandleInner::Ready(_))
    }

    /// Blocks until the batch is assembled.
    ///
    /// Reports [`Error::Cancelled`] if the background task was discarded
    /// by a shutdown before it ran to completion.
    pub fn wait(self) -> Result<Vec<(K, V)>, BulkError<K>> {
        match self.inner {
            HandleInner::Ready(result) => result,
            HandleInner::Pending(receiver) => receiver
                .recv()
                .unwrap_or(Err(BulkError::Op(Error::Cancelled))),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
