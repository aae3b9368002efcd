//! Speculative decode-ahead.
//!
//! A fixed pool of worker tasks drains a single queue of prefetch
//! requests. Workers feed decodes through [`ChunkCache::get_or_compute`],
//! the same path foreground requests take, so a prefetch never duplicates
//! a decode the foreground already started — and vice versa.
//!
//! The scheduler deliberately holds a reference to the cache only, never
//! to the file manager; cancelling the *effects* of stale work is the
//! cache's job (validity registry), while this module only stops stale
//! work from *starting*: each request carries a per-file generation, and
//! `drain_file` bumps it so queued requests from before a close or view
//! mutation are discarded when popped.
//!
//! Prefetch outcomes never reach a client. Failures are counted and
//! logged at debug level, nothing more.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use mefserve_core::{Chunk, ChunkKey, FileId};
use mefserve_observability::metrics;

use crate::cache::ChunkCache;
use crate::error::{EngineError, EngineResult};

struct PrefetchJob {
    key: ChunkKey,
    generation: u64,
    compute: BoxFuture<'static, EngineResult<Chunk>>,
}

#[derive(Default)]
struct PrefetchCounters {
    scheduled: AtomicU64,
    completed: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Counters snapshot for tests and introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchStats {
    pub scheduled: u64,
    pub completed: u64,
    pub dropped: u64,
    pub failed: u64,
}

/// Bounded worker pool decoding ahead of client reads.
pub struct PrefetchScheduler {
    tx: std::sync::Mutex<Option<mpsc::UnboundedSender<PrefetchJob>>>,
    generations: Arc<Mutex<HashMap<FileId, u64>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<PrefetchCounters>,
}

impl PrefetchScheduler {
    /// Spawn `max_workers` worker tasks servicing the queue. Must be
    /// called from within a tokio runtime.
    pub fn new(cache: Arc<ChunkCache>, max_workers: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<PrefetchJob>();
        let rx = Arc::new(Mutex::new(rx));
        let generations: Arc<Mutex<HashMap<FileId, u64>>> = Arc::new(Mutex::new(HashMap::new()));
        let counters = Arc::new(PrefetchCounters::default());

        let mut workers = Vec::with_capacity(max_workers.max(1));
        for worker_id in 0..max_workers.max(1) {
            workers.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&rx),
                Arc::clone(&cache),
                Arc::clone(&generations),
                Arc::clone(&counters),
            )));
        }

        Arc::new(Self {
            tx: std::sync::Mutex::new(Some(tx)),
            generations,
            workers: Mutex::new(workers),
            counters,
        })
    }

    /// Queue a decode for `key`. Non-blocking and best-effort: after
    /// shutdown the request is silently discarded.
    pub async fn submit(&self, key: ChunkKey, compute: BoxFuture<'static, EngineResult<Chunk>>) {
        let generation = {
            let generations = self.generations.lock().await;
            generations.get(&key.file_id).copied().unwrap_or(0)
        };

        let sender = self.tx.lock().expect("prefetch sender lock").clone();
        if let Some(sender) = sender {
            if sender
                .send(PrefetchJob {
                    key,
                    generation,
                    compute,
                })
                .is_ok()
            {
                self.counters.scheduled.fetch_add(1, Ordering::Relaxed);
                metrics::PREFETCH_SCHEDULED_TOTAL.inc();
            }
        }
    }

    /// Discard queued requests for `file_id` before they start. In-flight
    /// decodes are not interrupted; the cache drops their results.
    pub async fn drain_file(&self, file_id: &FileId) {
        let mut generations = self.generations.lock().await;
        *generations.entry(file_id.clone()).or_insert(0) += 1;
    }

    /// Close the queue and wait for the workers to finish their current
    /// jobs. Idempotent.
    pub async fn shutdown(&self) {
        self.tx.lock().expect("prefetch sender lock").take();
        let workers = {
            let mut workers = self.workers.lock().await;
            std::mem::take(&mut *workers)
        };
        for worker in workers {
            if let Err(err) = worker.await {
                tracing::warn!(error = %err, "prefetch worker aborted");
            }
        }
    }

    pub fn stats(&self) -> PrefetchStats {
        PrefetchStats {
            scheduled: self.counters.scheduled.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<PrefetchJob>>>,
    cache: Arc<ChunkCache>,
    generations: Arc<Mutex<HashMap<FileId, u64>>>,
    counters: Arc<PrefetchCounters>,
) {
    tracing::debug!(worker_id, "prefetch worker started");
    loop {
        // Only the receiver lock holder waits for work; processing happens
        // with the lock released so workers decode in parallel.
        let job = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(job) = job else { break };

        let current = {
            let generations = generations.lock().await;
            generations.get(&job.key.file_id).copied().unwrap_or(0)
        };
        if job.generation != current {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::PREFETCH_DROPPED_TOTAL.inc();
            continue;
        }

        match cache.get_or_compute(job.key.clone(), job.compute).await {
            Ok(_) => {
                // A decode that finished but was not retained (its file
                // was closed or its view superseded mid-flight) counts as
                // dropped, not completed.
                if cache.contains(&job.key).await {
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                    metrics::PREFETCH_COMPLETED_TOTAL.inc();
                } else {
                    counters.dropped.fetch_add(1, Ordering::Relaxed);
                    metrics::PREFETCH_DROPPED_TOTAL.inc();
                }
            }
            Err(EngineError::Invalidated) => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::PREFETCH_DROPPED_TOTAL.inc();
            }
            Err(err) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                metrics::PREFETCH_FAILED_TOTAL.inc();
                tracing::debug!(key = ?job.key, error = %err, "prefetch decode failed");
            }
        }
    }
    tracing::debug!(worker_id, "prefetch worker stopped");
}
