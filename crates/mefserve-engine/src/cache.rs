//! Chunk cache with single-flight decoding and LRU eviction.
//!
//! The cache is the rendezvous point for foreground requests and prefetch
//! workers: both call [`ChunkCache::get_or_compute`], so at most one decode
//! runs per key no matter how many tasks ask for it.
//!
//! ## Entry states
//!
//! ```text
//!            first miss                decode done
//!  (absent) ───────────→  pending  ───────────────→  completed (LRU)
//!                            │                            │
//!                            │ decode failed /            │ capacity
//!                            │ invalidated                │ overflow
//!                            ↓                            ↓
//!                         (absent)                     (absent)
//! ```
//!
//! Completed entries live in an `lru::LruCache` bounded by entry count;
//! pending entries live in a side map and are never evicted. A pending
//! entry is a `tokio::sync::watch` promise: the task that inserted it runs
//! the decode, every other task subscribes and waits.
//!
//! ## Validity registry
//!
//! The cache keeps the current view version per open file. Insertions are
//! gated on it, which is what lets `close_file` and view mutations cancel
//! the effects of in-flight decodes: once a file's entries are swept, a
//! late decode finds its pending slot gone and its result is returned to
//! the caller but never stored.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use lru::LruCache;
use tokio::sync::{watch, Mutex};

use mefserve_core::{Chunk, ChunkKey, FileId};
use mefserve_observability::metrics;

use crate::error::{EngineError, EngineResult};

type ChunkOutcome = EngineResult<Arc<Chunk>>;
type Promise = Arc<watch::Sender<Option<ChunkOutcome>>>;

struct CacheState {
    completed: LruCache<ChunkKey, Arc<Chunk>>,
    pending: HashMap<ChunkKey, Promise>,
    /// FileId -> current view version. Insertions for any other
    /// (file, version) are refused.
    current_versions: HashMap<FileId, u64>,
}

#[derive(Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

/// Bounded LRU cache of decoded chunks, keyed by (file, version, index).
pub struct ChunkCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    state: Mutex<CacheState>,
    counters: CacheCounters,
}

/// Point-in-time counters snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub completed_entries: usize,
    pub pending_entries: usize,
    pub capacity: usize,
}

enum Lookup {
    Ready(Arc<Chunk>),
    Wait(watch::Receiver<Option<ChunkOutcome>>),
    Compute(Promise),
}

impl ChunkCache {
    /// Create a cache holding at most `capacity` completed chunks
    /// (floor 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity has floor 1");
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState {
                    completed: LruCache::new(capacity),
                    pending: HashMap::new(),
                    current_versions: HashMap::new(),
                }),
                counters: CacheCounters::default(),
            }),
        }
    }

    /// Make `file_id` eligible for caching, starting at view version 0.
    pub async fn register_file(&self, file_id: &FileId) {
        let mut state = self.inner.state.lock().await;
        state.current_versions.insert(file_id.clone(), 0);
    }

    /// Return the chunk for `key`, decoding it via `compute` on a miss.
    ///
    /// At most one `compute` runs per key: the task that finds neither a
    /// completed nor a pending entry inserts a promise and decodes; every
    /// concurrent caller for the same key awaits that promise and shares
    /// the resulting `Arc<Chunk>`. Failed decodes are not cached — the
    /// promise fans the error out to current waiters and the next request
    /// retries.
    ///
    /// The decode runs on its own task so a caller disappearing mid-wait
    /// (an RPC deadline, a dropped client) cannot strand waiters behind a
    /// never-resolved promise.
    pub async fn get_or_compute<F>(&self, key: ChunkKey, compute: F) -> ChunkOutcome
    where
        F: Future<Output = EngineResult<Chunk>> + Send + 'static,
    {
        let lookup = {
            let mut state = self.inner.state.lock().await;

            if let Some(chunk) = state.completed.get(&key) {
                self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                metrics::CACHE_HITS_TOTAL.inc();
                Lookup::Ready(Arc::clone(chunk))
            } else if let Some(promise) = state.pending.get(&key) {
                // Joining an in-flight decode counts as a hit: no extra
                // decoder work happens on behalf of this caller.
                self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                metrics::CACHE_HITS_TOTAL.inc();
                Lookup::Wait(promise.subscribe())
            } else if state.current_versions.get(&key.file_id) != Some(&key.version) {
                return Err(EngineError::Invalidated);
            } else {
                self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
                metrics::CACHE_MISSES_TOTAL.inc();
                let (tx, _rx) = watch::channel(None);
                let promise = Arc::new(tx);
                state.pending.insert(key.clone(), Arc::clone(&promise));
                Lookup::Compute(promise)
            }
        };

        match lookup {
            Lookup::Ready(chunk) => Ok(chunk),
            Lookup::Wait(mut rx) => match rx.wait_for(|outcome| outcome.is_some()).await {
                Ok(outcome) => (*outcome).clone().unwrap_or(Err(EngineError::Invalidated)),
                // The decoding task vanished without resolving the promise.
                Err(_) => Err(EngineError::Invalidated),
            },
            Lookup::Compute(promise) => {
                let inner = Arc::clone(&self.inner);
                let task_key = key.clone();
                let handle = tokio::spawn(async move {
                    let started = Instant::now();
                    let result = compute.await;
                    metrics::DECODE_LATENCY.observe(started.elapsed().as_secs_f64());
                    inner.finish_compute(task_key, promise, result).await
                });
                match handle.await {
                    Ok(outcome) => outcome,
                    Err(join_err) => {
                        tracing::error!(key = ?key, error = %join_err, "decode task aborted");
                        Err(EngineError::Invalidated)
                    }
                }
            }
        }
    }

    /// Whether `key` has a completed or pending entry. Does not touch LRU
    /// recency.
    pub async fn contains(&self, key: &ChunkKey) -> bool {
        let state = self.inner.state.lock().await;
        state.completed.contains(key) || state.pending.contains_key(key)
    }

    /// Drop every entry of `file_id` at a version other than
    /// `keep_version`, unblocking stale waiters with `Invalidated`, and
    /// record `keep_version` as current.
    pub async fn invalidate(&self, file_id: &FileId, keep_version: u64) {
        let mut state = self.inner.state.lock().await;
        state.current_versions.insert(file_id.clone(), keep_version);
        self.sweep(&mut state, |key| {
            key.file_id == *file_id && key.version != keep_version
        });
    }

    /// Drop every entry of `file_id` and deregister it; subsequent
    /// insertions for the file are refused until it is registered again.
    pub async fn invalidate_file(&self, file_id: &FileId) {
        let mut state = self.inner.state.lock().await;
        state.current_versions.remove(file_id);
        self.sweep(&mut state, |key| key.file_id == *file_id);
    }

    fn sweep<P: Fn(&ChunkKey) -> bool>(&self, state: &mut CacheState, doomed: P) {
        let stale_completed: Vec<ChunkKey> = state
            .completed
            .iter()
            .filter(|(key, _)| doomed(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale_completed {
            state.completed.pop(key);
        }

        let stale_pending: Vec<ChunkKey> = state
            .pending
            .keys()
            .filter(|key| doomed(key))
            .cloned()
            .collect();
        for key in &stale_pending {
            if let Some(promise) = state.pending.remove(key) {
                let _ = promise.send(Some(Err(EngineError::Invalidated)));
            }
        }

        let dropped = (stale_completed.len() + stale_pending.len()) as u64;
        if dropped > 0 {
            self.inner
                .counters
                .invalidations
                .fetch_add(dropped, Ordering::Relaxed);
            metrics::CACHE_INVALIDATIONS_TOTAL.inc_by(dropped);
            metrics::CACHE_ENTRIES.set(state.completed.len() as i64);
            tracing::debug!(dropped, "swept cache entries");
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock().await;
        CacheStats {
            hits: self.inner.counters.hits.load(Ordering::Relaxed),
            misses: self.inner.counters.misses.load(Ordering::Relaxed),
            evictions: self.inner.counters.evictions.load(Ordering::Relaxed),
            invalidations: self.inner.counters.invalidations.load(Ordering::Relaxed),
            completed_entries: state.completed.len(),
            pending_entries: state.pending.len(),
            capacity: state.completed.cap().get(),
        }
    }

    /// Completed entries currently held.
    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.completed.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl CacheInner {
    /// Publish a finished decode: store it at MRU (evicting as needed) and
    /// resolve the promise — unless the entry was swept while decoding, in
    /// which case the result is handed back to the caller but not stored.
    async fn finish_compute(
        &self,
        key: ChunkKey,
        promise: Promise,
        result: EngineResult<Chunk>,
    ) -> ChunkOutcome {
        let mut state = self.state.lock().await;

        let still_pending = state
            .pending
            .get(&key)
            .map(|current| Arc::ptr_eq(current, &promise))
            .unwrap_or(false);

        match result {
            Ok(chunk) => {
                let chunk = Arc::new(chunk);
                if still_pending {
                    state.pending.remove(&key);
                    if let Some((evicted_key, _)) =
                        state.completed.push(key.clone(), Arc::clone(&chunk))
                    {
                        if evicted_key != key {
                            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                            metrics::CACHE_EVICTIONS_TOTAL.inc();
                            tracing::trace!(evicted = ?evicted_key, "evicted LRU chunk");
                        }
                    }
                    metrics::CACHE_ENTRIES.set(state.completed.len() as i64);
                    let _ = promise.send(Some(Ok(Arc::clone(&chunk))));
                }
                Ok(chunk)
            }
            Err(err) => {
                if still_pending {
                    state.pending.remove(&key);
                    let _ = promise.send(Some(Err(err.clone())));
                }
                Err(err)
            }
        }
    }
}
