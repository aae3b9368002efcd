//! mefserve observability.
//!
//! Prometheus counters and gauges for the chunk cache, prefetch pool, and
//! file registry, plus an axum router the server binary mounts on its
//! metrics port: `/metrics` for scrapes, `/healthz` for liveness probes.
//!
//! # Usage
//!
//! ```no_run
//! use mefserve_observability::{metrics, exporter};
//!
//! // Register metrics with the global registry (idempotent)
//! metrics::init();
//!
//! // Mount the exporter
//! let router = exporter::create_metrics_router();
//! ```

pub mod exporter;
pub mod metrics;

pub use metrics::{init as init_metrics, REGISTRY};

/// Initialize all observability components.
pub fn init() {
    metrics::init();
}
