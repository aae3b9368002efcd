//! mefserve chunk cache and prefetch engine.
//!
//! This crate is the concurrent core of the server: it tracks open
//! recordings and their per-file view state, caches decoded signal chunks
//! with LRU eviction, and speculatively decodes ahead of sequential
//! readers.
//!
//! ## Read Flow
//!
//! ```text
//! get_signal_segment(file, i)
//!         ↓
//! FileManager — resolve view (version, range, channels)
//!         ↓
//! ChunkCache.get_or_compute(key)
//!         ↓
//!     CACHE HIT? ──YES──→ return Arc<Chunk> (<1ms)
//!         │
//!         NO (or join an in-flight decode)
//!         ↓
//! DecoderSession.read(channels, t0, t1)
//!         ↓
//! insert at MRU, evict LRU if over capacity
//!         ↓
//! PrefetchScheduler ← submit keys i+1 .. i+n_prefetch
//!         ↓
//! return chunk
//! ```
//!
//! ## Main Components
//!
//! ### FileManager
//! The façade the gRPC layer talks to: open/close files, mutate views,
//! serve chunk requests, coordinate cache and prefetch.
//!
//! ### ChunkCache
//! Bounded LRU keyed by (file, view version, segment index) with
//! single-flight decoding: concurrent requests for the same key share one
//! decode and one `Arc<Chunk>`.
//!
//! ### PrefetchScheduler
//! A bounded worker pool feeding decodes through the same cache path as
//! foreground requests, so prefetch and foreground never duplicate work.
//!
//! ### FileView
//! Per-file segment size and active-channel state. Every mutation bumps a
//! version that is part of the cache key, which makes stale entries
//! unreachable the instant a view changes.
//!
//! ## Concurrency Model
//!
//! Tokio multi-threaded runtime; foreground handler tasks and prefetch
//! workers call into the same manager and cache. Lock order is always
//! registry → view → cache → decoder handle, and decoding never runs under
//! the cache lock.

pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod prefetch;
pub mod view;

pub use cache::{CacheStats, ChunkCache};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use manager::FileManager;
pub use prefetch::{PrefetchScheduler, PrefetchStats};
pub use view::{FileView, ViewSnapshot};
