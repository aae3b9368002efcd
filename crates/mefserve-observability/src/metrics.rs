use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Once;

static INIT: Once = Once::new();

lazy_static! {
    /// Global Prometheus metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Chunk Cache Metrics
    // ============================================================================

    /// Lookups served from a completed or pending cache entry
    pub static ref CACHE_HITS_TOTAL: IntCounter = IntCounter::new(
        "mefserve_cache_hits_total",
        "Total chunk cache hits"
    ).expect("metric can be created");

    /// Lookups that had to start a decode
    pub static ref CACHE_MISSES_TOTAL: IntCounter = IntCounter::new(
        "mefserve_cache_misses_total",
        "Total chunk cache misses"
    ).expect("metric can be created");

    /// Completed entries pushed out by the LRU policy
    pub static ref CACHE_EVICTIONS_TOTAL: IntCounter = IntCounter::new(
        "mefserve_cache_evictions_total",
        "Total chunk cache evictions"
    ).expect("metric can be created");

    /// Entries dropped by view mutation or file close
    pub static ref CACHE_INVALIDATIONS_TOTAL: IntCounter = IntCounter::new(
        "mefserve_cache_invalidations_total",
        "Total chunk cache entries dropped by invalidation"
    ).expect("metric can be created");

    /// Completed entries currently cached
    pub static ref CACHE_ENTRIES: IntGauge = IntGauge::new(
        "mefserve_cache_entries",
        "Completed chunk cache entries"
    ).expect("metric can be created");

    // ============================================================================
    // Prefetch Metrics
    // ============================================================================

    /// Prefetch requests accepted onto the queue
    pub static ref PREFETCH_SCHEDULED_TOTAL: IntCounter = IntCounter::new(
        "mefserve_prefetch_scheduled_total",
        "Total prefetch requests scheduled"
    ).expect("metric can be created");

    /// Prefetch decodes that completed and landed in the cache
    pub static ref PREFETCH_COMPLETED_TOTAL: IntCounter = IntCounter::new(
        "mefserve_prefetch_completed_total",
        "Total prefetch decodes completed"
    ).expect("metric can be created");

    /// Prefetch requests dropped before or after running (stale generation,
    /// invalidated result)
    pub static ref PREFETCH_DROPPED_TOTAL: IntCounter = IntCounter::new(
        "mefserve_prefetch_dropped_total",
        "Total prefetch requests dropped"
    ).expect("metric can be created");

    /// Prefetch decodes that failed; never surfaced to clients
    pub static ref PREFETCH_FAILED_TOTAL: IntCounter = IntCounter::new(
        "mefserve_prefetch_failed_total",
        "Total prefetch decodes failed"
    ).expect("metric can be created");

    // ============================================================================
    // File Registry Metrics
    // ============================================================================

    /// Files currently open
    pub static ref OPEN_FILES: IntGauge = IntGauge::new(
        "mefserve_open_files",
        "Number of currently open recordings"
    ).expect("metric can be created");

    /// Decode latency as observed by the cache compute path
    pub static ref DECODE_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new("mefserve_decode_latency_seconds", "Segment decode latency in seconds")
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
    ).expect("metric can be created");
}

/// Register all metrics with the global registry.
/// Can be called multiple times safely (idempotent).
pub fn init() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(CACHE_HITS_TOTAL.clone()))
            .expect("cache_hits_total can be registered");
        REGISTRY
            .register(Box::new(CACHE_MISSES_TOTAL.clone()))
            .expect("cache_misses_total can be registered");
        REGISTRY
            .register(Box::new(CACHE_EVICTIONS_TOTAL.clone()))
            .expect("cache_evictions_total can be registered");
        REGISTRY
            .register(Box::new(CACHE_INVALIDATIONS_TOTAL.clone()))
            .expect("cache_invalidations_total can be registered");
        REGISTRY
            .register(Box::new(CACHE_ENTRIES.clone()))
            .expect("cache_entries can be registered");
        REGISTRY
            .register(Box::new(PREFETCH_SCHEDULED_TOTAL.clone()))
            .expect("prefetch_scheduled_total can be registered");
        REGISTRY
            .register(Box::new(PREFETCH_COMPLETED_TOTAL.clone()))
            .expect("prefetch_completed_total can be registered");
        REGISTRY
            .register(Box::new(PREFETCH_DROPPED_TOTAL.clone()))
            .expect("prefetch_dropped_total can be registered");
        REGISTRY
            .register(Box::new(PREFETCH_FAILED_TOTAL.clone()))
            .expect("prefetch_failed_total can be registered");
        REGISTRY
            .register(Box::new(OPEN_FILES.clone()))
            .expect("open_files can be registered");
        REGISTRY
            .register(Box::new(DECODE_LATENCY.clone()))
            .expect("decode_latency can be registered");
    });
}
