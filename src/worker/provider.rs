//! Indexed multi-task provider.
//!
//! A provider owns one thread, a FIFO of keys waiting to be computed, and the
//! map of finished results. Each finished key is published to the map on its
//! own, so a partially computed set is usable immediately; consumers learn
//! about new entries through a coalescing [`ChangeFlag`].
//!
//! Every queued key belongs to the provider's current *generation*. `clear`,
//! `load` and `unload` bump the generation under the queue lock, so a result
//! computed for an older generation (or another media file) is dropped when it
//! completes instead of being merged.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::run_guarded;
use crate::error::Result;
use crate::events::{ChangeFlag, EventSink, PipelineEvent};
use crate::io::cache::{CacheKey, PersistentCache};
use crate::types::{ArtifactKind, LoadedMedia};

/// Per-index computation run on a provider thread.
pub trait ProviderContext: Send + 'static {
    type Key: Copy + Eq + Hash + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static;
    type Value: Clone + Send + Sync + Serialize + DeserializeOwned + 'static;

    /// Artifact kind of the result map; selects the cache record.
    fn kind(&self) -> ArtifactKind;

    fn work(&mut self, media: &LoadedMedia, key: Self::Key) -> Result<Self::Value>;
}

struct ProviderState<K, V> {
    media: Option<LoadedMedia>,
    generation: u64,
    queue: VecDeque<K>,
    queued: HashSet<K>,
    in_flight: Option<(K, u64)>,
    results: HashMap<K, V>,
    /// Results were added since the map was last persisted.
    dirty: bool,
    /// A fatal error stopped work for the current media.
    halted: bool,
    shutdown: bool,
}

impl<K: Copy + Eq + Hash, V> ProviderState<K, V> {
    fn drop_queue(&mut self) {
        self.queue.clear();
        self.queued.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    fn is_known(&self, key: K) -> bool {
        self.results.contains_key(&key)
            || self.queued.contains(&key)
            || self.in_flight == Some((key, self.generation))
    }
}

struct Shared<K, V> {
    state: Mutex<ProviderState<K, V>>,
    wake: Condvar,
    /// Held across snapshot-and-save so a cache read never races a pending
    /// write for the same media. Always taken before `state`.
    persist: Mutex<()>,
}

impl<K, V> Shared<K, V> {
    fn lock(&self) -> MutexGuard<'_, ProviderState<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist_lock(&self) -> MutexGuard<'_, ()> {
        self.persist.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type SharedOf<C> = Shared<<C as ProviderContext>::Key, <C as ProviderContext>::Value>;

pub struct IndexedProvider<C: ProviderContext> {
    kind: ArtifactKind,
    shared: Arc<SharedOf<C>>,
    context: Option<C>,
    handle: Option<JoinHandle<()>>,
    cache: Arc<PersistentCache>,
    events: EventSink,
    changes: ChangeFlag,
}

impl<C: ProviderContext> IndexedProvider<C> {
    pub fn new(context: C, cache: Arc<PersistentCache>, events: EventSink) -> Self {
        Self {
            kind: context.kind(),
            shared: Arc::new(Shared {
                state: Mutex::new(ProviderState {
                    media: None,
                    generation: 0,
                    queue: VecDeque::new(),
                    queued: HashSet::new(),
                    in_flight: None,
                    results: HashMap::new(),
                    dirty: false,
                    halted: false,
                    shutdown: false,
                }),
                wake: Condvar::new(),
                persist: Mutex::new(()),
            }),
            context: Some(context),
            handle: None,
            cache,
            events,
            changes: ChangeFlag::default(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn start(&mut self) -> Result<()> {
        let Some(context) = self.context.take() else {
            return Ok(());
        };
        let worker = ProviderThread {
            kind: self.kind,
            context,
            shared: Arc::clone(&self.shared),
            cache: Arc::clone(&self.cache),
            events: self.events.clone(),
            changes: self.changes.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("scrubline-{}", self.kind.tag()))
            .spawn(move || worker.run())?;
        self.handle = Some(handle);
        tracing::debug!(provider.kind = %self.kind, "provider started");
        Ok(())
    }

    /// Stop the thread after its current item; queued items are dropped.
    pub fn stop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.shutdown = true;
            state.drop_queue();
        }
        self.shared.wake.notify_all();
        self.context = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!(provider.kind = %self.kind, "provider thread terminated abnormally");
            }
        }
    }

    /// Switch to `media`, seeding the result map from the persistent cache.
    /// Queued work for the previous target is discarded. Returns the number
    /// of entries restored from cache.
    pub fn load(&self, media: LoadedMedia) -> usize {
        let _persist = self.shared.persist_lock();
        let key = CacheKey::new(self.kind, &media.identity);
        let seed: HashMap<C::Key, C::Value> = self.cache.load(&key).unwrap_or_default();
        let seeded = seed.len();

        {
            let mut state = self.shared.lock();
            state.drop_queue();
            state.media = Some(media);
            state.results = seed;
            state.dirty = false;
            state.halted = false;
        }
        self.changes.mark();
        tracing::info!(provider.kind = %self.kind, cache.entries = seeded, "provider warm-started");
        seeded
    }

    /// Persist unsaved results, then forget the media and everything computed for it.
    pub fn unload(&self) {
        let _persist = self.shared.persist_lock();
        let pending_flush = {
            let mut state = self.shared.lock();
            let flush = Self::take_flush(&mut state, self.kind);
            state.drop_queue();
            state.media = None;
            state.results = HashMap::new();
            state.dirty = false;
            state.halted = false;
            flush
        };
        self.changes.mark();
        if let Some((key, snapshot)) = pending_flush {
            if let Err(err) = self.cache.save(&key, &snapshot) {
                tracing::warn!(provider.kind = %self.kind, error = %err, "failed to persist results on unload");
            }
        }
    }

    /// Discard queued work without touching results or the thread.
    pub fn clear(&self) {
        let mut state = self.shared.lock();
        let dropped = state.queue.len();
        state.drop_queue();
        tracing::debug!(provider.kind = %self.kind, queue.dropped = dropped, "provider queue cleared");
    }

    /// Queue `keys` in order, skipping keys that are computed, queued, or in
    /// flight. Returns how many were queued.
    pub fn enqueue<I: IntoIterator<Item = C::Key>>(&self, keys: I) -> usize {
        let mut state = self.shared.lock();
        if state.media.is_none() || state.halted || state.shutdown {
            return 0;
        }
        let mut added = 0;
        for key in keys {
            if state.is_known(key) {
                continue;
            }
            state.queued.insert(key);
            state.queue.push_back(key);
            added += 1;
        }
        drop(state);
        if added > 0 {
            self.shared.wake.notify_one();
        }
        added
    }

    /// Persist the result map now if it changed since the last flush.
    /// Returns whether a record was written.
    pub fn flush(&self) -> Result<bool> {
        let _persist = self.shared.persist_lock();
        let pending_flush = Self::take_flush(&mut self.shared.lock(), self.kind);
        match pending_flush {
            Some((key, snapshot)) => {
                self.cache.save(&key, &snapshot)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[must_use]
    pub fn get(&self, key: C::Key) -> Option<C::Value> {
        self.shared.lock().results.get(&key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: C::Key) -> bool {
        self.shared.lock().results.contains_key(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.lock().results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.lock().results.is_empty()
    }

    /// Keys waiting to be computed, excluding the one in flight.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.shared.lock().halted
    }

    #[must_use]
    pub fn snapshot(&self) -> HashMap<C::Key, C::Value> {
        self.shared.lock().results.clone()
    }

    /// Flag raised whenever the result map changes.
    #[must_use]
    pub fn changes(&self) -> &ChangeFlag {
        &self.changes
    }

    fn take_flush(
        state: &mut ProviderState<C::Key, C::Value>,
        kind: ArtifactKind,
    ) -> Option<(CacheKey, HashMap<C::Key, C::Value>)> {
        if !state.dirty {
            return None;
        }
        let media = state.media.as_ref()?;
        state.dirty = false;
        Some((CacheKey::new(kind, &media.identity), state.results.clone()))
    }
}

impl<C: ProviderContext> Drop for IndexedProvider<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ProviderThread<C: ProviderContext> {
    kind: ArtifactKind,
    context: C,
    shared: Arc<SharedOf<C>>,
    cache: Arc<PersistentCache>,
    events: EventSink,
    changes: ChangeFlag,
}

impl<C: ProviderContext> ProviderThread<C> {
    fn run(mut self) {
        while let Some((media, generation, key)) = self.next_item() {
            let outcome = run_guarded(|| self.context.work(&media, key));
            if self.publish(generation, key, outcome) {
                self.persist_drained();
            }
        }
        tracing::debug!(provider.kind = %self.kind, "provider thread exiting");
    }

    /// Save the result map after the queue ran dry. `persist` is taken before
    /// the state lock, so an `unload` or `load` racing with this either sees
    /// the map already saved or saves it itself.
    fn persist_drained(&self) {
        let _persist = self.shared.persist_lock();
        let (pending_flush, generation) = {
            let mut state = self.shared.lock();
            let generation = state.generation;
            (IndexedProvider::<C>::take_flush(&mut state, self.kind), generation)
        };
        let Some((cache_key, snapshot)) = pending_flush else {
            return;
        };
        if let Err(err) = self.cache.save(&cache_key, &snapshot) {
            tracing::warn!(provider.kind = %self.kind, error = %err, "failed to persist results");
            let mut state = self.shared.lock();
            if state.generation == generation {
                state.dirty = true;
            }
        }
    }

    /// Block until a key is available; `None` means shut down.
    fn next_item(&self) -> Option<(LoadedMedia, u64, C::Key)> {
        let mut state = self.shared.lock();
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(key) = state.queue.pop_front() {
                state.queued.remove(&key);
                let Some(media) = state.media.clone() else {
                    continue;
                };
                let generation = state.generation;
                state.in_flight = Some((key, generation));
                return Some((media, generation, key));
            }
            state = self
                .shared
                .wake
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Merge one outcome into the map. Returns whether the queue just ran dry
    /// with unsaved results.
    fn publish(&self, generation: u64, key: C::Key, outcome: Result<C::Value>) -> bool {
        let mut state = self.shared.lock();
        state.in_flight = None;
        if state.generation != generation {
            tracing::debug!(provider.kind = %self.kind, ?key, "discarding stale result");
            return false;
        }

        match outcome {
            Ok(value) => {
                state.results.insert(key, value);
                state.dirty = true;
                self.changes.mark();
            }
            Err(err) if err.is_fatal() => {
                tracing::error!(provider.kind = %self.kind, ?key, error = %err, "halting provider for current media");
                state.halted = true;
                state.queue.clear();
                state.queued.clear();
                self.events.emit(PipelineEvent::AnalysisHalted {
                    kind: self.kind,
                    reason: err.to_string(),
                });
            }
            Err(err) => {
                tracing::warn!(provider.kind = %self.kind, ?key, error = %err, "computation failed");
            }
        }

        state.queue.is_empty() && state.dirty
    }
}
