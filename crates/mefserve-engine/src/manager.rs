//! Top-level file manager.
//!
//! The façade the gRPC service sits on: it owns the open-file registry and
//! coordinates views, cache, decoder sessions, and the prefetch pool. All
//! operations take paths; the manager normalizes them into [`FileId`]s so
//! equivalent spellings of a path share one open file and one set of cache
//! entries.
//!
//! ## Thread Safety
//!
//! - `FileManager` is `Send + Sync` and shared via `Arc`
//! - Registry behind `RwLock` (fast reads, rare writes on open/close)
//! - Each view behind its own `Mutex` (fine-grained locking)
//! - Lock order: registry → view → cache → decoder handle

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{Mutex, RwLock};

use mefserve_core::{Chunk, ChunkKey, FileId, RecordingMetadata};
use mefserve_decoder::{DecoderSession, SignalDecoder};
use mefserve_observability::metrics;

use crate::cache::ChunkCache;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::prefetch::PrefetchScheduler;
use crate::view::{FileView, ViewSnapshot};

/// One open recording: metadata snapshot, mutable view, decoder session.
struct OpenRecording {
    id: FileId,
    metadata: Arc<RecordingMetadata>,
    view: Mutex<FileView>,
    session: Arc<DecoderSession>,
}

/// Registry and coordinator for all open recordings.
pub struct FileManager {
    config: EngineConfig,
    decoder: Arc<dyn SignalDecoder>,
    cache: Arc<ChunkCache>,
    prefetch: Arc<PrefetchScheduler>,
    files: RwLock<HashMap<FileId, Arc<OpenRecording>>>,
}

impl FileManager {
    /// Build the engine around `decoder`. Must be called from within a
    /// tokio runtime (the prefetch pool spawns its workers here).
    pub fn new(decoder: Arc<dyn SignalDecoder>, config: EngineConfig) -> Self {
        let cache = Arc::new(ChunkCache::new(config.cache_capacity()));
        let prefetch = PrefetchScheduler::new(Arc::clone(&cache), config.max_workers);
        Self {
            config,
            decoder,
            cache,
            prefetch,
            files: RwLock::new(HashMap::new()),
        }
    }

    /// The cache, for introspection in tests and admin surfaces.
    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    /// The prefetch pool, for introspection.
    pub fn prefetch(&self) -> &PrefetchScheduler {
        &self.prefetch
    }

    /// Open `path`, returning its metadata snapshot. Idempotent: opening
    /// an already-open path returns the existing snapshot without touching
    /// the decoder.
    pub async fn open_file(&self, path: &str) -> EngineResult<Arc<RecordingMetadata>> {
        let id = self.file_id(path)?;

        // Fast path: already open.
        {
            let files = self.files.read().await;
            if let Some(file) = files.get(&id) {
                return Ok(Arc::clone(&file.metadata));
            }
        }

        let mut files = self.files.write().await;

        // Double-check (another task may have opened it while we waited).
        if let Some(file) = files.get(&id) {
            return Ok(Arc::clone(&file.metadata));
        }

        let (metadata, handle) = self.decoder.open(id.as_path()).await?;
        let metadata = Arc::new(metadata);

        self.cache.register_file(&id).await;
        files.insert(
            id.clone(),
            Arc::new(OpenRecording {
                id: id.clone(),
                metadata: Arc::clone(&metadata),
                view: Mutex::new(FileView::new(Arc::clone(&metadata))),
                session: DecoderSession::new(handle),
            }),
        );
        metrics::OPEN_FILES.set(files.len() as i64);

        tracing::info!(
            file = %id,
            channels = metadata.channels.len(),
            duration_us = metadata.duration_us(),
            "opened recording"
        );

        Ok(metadata)
    }

    /// Close `path`: cancel its prefetches, purge its cache entries, close
    /// the decoder handle, drop the view. Idempotent; closing an unknown
    /// path is a no-op.
    pub async fn close_file(&self, path: &str) -> EngineResult<()> {
        let id = self.file_id(path)?;

        let removed = {
            let mut files = self.files.write().await;
            let removed = files.remove(&id);
            metrics::OPEN_FILES.set(files.len() as i64);
            removed
        };

        let Some(file) = removed else {
            return Ok(());
        };

        self.prefetch.drain_file(&id).await;
        self.cache.invalidate_file(&id).await;
        if let Err(err) = file.session.close().await {
            tracing::warn!(file = %id, error = %err, "decoder close failed");
        }

        tracing::info!(file = %id, "closed recording");
        Ok(())
    }

    /// Snapshot of currently open files, sorted for stable output.
    pub async fn list_open_files(&self) -> Vec<FileId> {
        let files = self.files.read().await;
        let mut ids: Vec<FileId> = files.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Metadata snapshot for an open file.
    pub async fn get_file_info(&self, path: &str) -> EngineResult<Arc<RecordingMetadata>> {
        Ok(Arc::clone(&self.lookup(path).await?.metadata))
    }

    /// Set the segment duration and return the new segment count.
    pub async fn set_segment_seconds(&self, path: &str, seconds: f64) -> EngineResult<u64> {
        let file = self.lookup(path).await?;

        // The invalidation sweep runs under the view lock so concurrent
        // mutations cannot reorder their sweeps against their version
        // bumps.
        let mut view = file.view.lock().await;
        let (new_version, count) = view.set_segment_seconds(seconds)?;
        self.prefetch.drain_file(&file.id).await;
        self.cache.invalidate(&file.id, new_version).await;

        tracing::debug!(
            file = %file.id,
            seconds,
            segments = count,
            version = new_version,
            "segment size changed"
        );
        Ok(count)
    }

    /// Replace the active channel set. Empty resets to all channels.
    pub async fn set_active_channels(&self, path: &str, names: Vec<String>) -> EngineResult<()> {
        let file = self.lookup(path).await?;

        let mut view = file.view.lock().await;
        let new_version = view.set_active_channels(names)?;
        self.prefetch.drain_file(&file.id).await;
        self.cache.invalidate(&file.id, new_version).await;

        tracing::debug!(file = %file.id, version = new_version, "active channels changed");
        Ok(())
    }

    pub async fn get_segment_count(&self, path: &str) -> EngineResult<u64> {
        let file = self.lookup(path).await?;
        let view = file.view.lock().await;
        Ok(view.segment_count())
    }

    /// Fetch segment `index` under the current view, decoding on a miss,
    /// then queue prefetch for the following `n_prefetch` segments.
    pub async fn get_signal_segment(&self, path: &str, index: u64) -> EngineResult<Arc<Chunk>> {
        let file = self.lookup(path).await?;
        let snapshot = {
            let view = file.view.lock().await;
            view.snapshot()
        };
        // Bounds check before touching the cache.
        snapshot.segment_range(index)?;

        let key = ChunkKey::new(file.id.clone(), snapshot.version, index);
        let chunk = self
            .cache
            .get_or_compute(key, decode_segment(&file, &snapshot, index))
            .await?;

        if self.config.n_prefetch > 0 {
            self.schedule_prefetch(&file, &snapshot, index).await;
        }

        Ok(chunk)
    }

    /// Close every open file and stop the prefetch pool. Called from the
    /// binary's shutdown path; idempotent.
    pub async fn shutdown(&self) {
        let open = self.list_open_files().await;
        for id in &open {
            if let Err(err) = self.close_file(id.as_str()).await {
                tracing::warn!(file = %id, error = %err, "close during shutdown failed");
            }
        }
        self.prefetch.shutdown().await;
        tracing::info!(closed = open.len(), "file manager shut down");
    }

    /// Queue decodes for the segments after `index` under the same view
    /// snapshot. Skips indices past the end and keys already present or
    /// in flight.
    async fn schedule_prefetch(
        &self,
        file: &Arc<OpenRecording>,
        snapshot: &ViewSnapshot,
        index: u64,
    ) {
        for ahead in 1..=self.config.n_prefetch as u64 {
            let next = index + ahead;
            if next >= snapshot.segment_count {
                break;
            }
            let key = ChunkKey::new(file.id.clone(), snapshot.version, next);
            if self.cache.contains(&key).await {
                continue;
            }
            self.prefetch
                .submit(key, Box::pin(decode_segment(file, snapshot, next)))
                .await;
        }
    }

    fn file_id(&self, path: &str) -> EngineResult<FileId> {
        if !Path::new(path).is_absolute() {
            return Err(EngineError::InvalidArgument(format!(
                "recording path must be absolute: {path}"
            )));
        }
        Ok(FileId::new(path))
    }

    async fn lookup(&self, path: &str) -> EngineResult<Arc<OpenRecording>> {
        let id = self.file_id(path)?;
        let files = self.files.read().await;
        files
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotOpen(id.to_string()))
    }
}

/// Factory for one segment decode, usable as the foreground compute or a
/// queued prefetch. Carries the view snapshot it was created under, so a
/// racing mutation cannot change what gets decoded.
fn decode_segment(
    file: &Arc<OpenRecording>,
    snapshot: &ViewSnapshot,
    index: u64,
) -> BoxFuture<'static, EngineResult<Chunk>> {
    let session = Arc::clone(&file.session);
    let start_us = file.metadata.start_us;
    let channel_names = snapshot.channel_names.clone();
    let sample_rates = snapshot.sample_rates.clone();
    let range = snapshot.segment_range(index);

    Box::pin(async move {
        let (t0_rel, t1_rel) = range?;
        let matrix = session
            .read(&channel_names, start_us + t0_rel, start_us + t1_rel)
            .await?;
        Ok(Chunk {
            data: matrix,
            channel_names,
            sample_rates,
            t_start_us: t0_rel,
            t_end_us: t1_rel,
        })
    })
}
