//! Metrics exporter.
//!
//! The server binary mounts this router on its metrics port: `/metrics`
//! serves the mefserve registry in Prometheus text format, `/healthz`
//! answers liveness probes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{Encoder, TextEncoder};

use crate::metrics::REGISTRY;

/// Encode the mefserve registry into the Prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("non-utf8 metrics output: {e}")))
}

/// Handler for the Prometheus scrape endpoint.
pub async fn metrics_handler() -> Response {
    match render() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", TextEncoder::new().format_type())],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

async fn healthz_handler() -> &'static str {
    "ok"
}

/// Router serving `/metrics` and `/healthz`.
pub fn create_metrics_router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt; // for `oneshot`

    #[tokio::test]
    async fn metrics_endpoint_serves_the_mefserve_registry() {
        metrics::init();

        // Touch a couple of counters so the scrape has real series.
        metrics::CACHE_HITS_TOTAL.inc();
        metrics::PREFETCH_SCHEDULED_TOTAL.inc();

        let app = create_metrics_router();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/plain; version=0.0.4"
        );

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("mefserve_cache_hits_total"));
        assert!(body.contains("mefserve_prefetch_scheduled_total"));
        assert!(body.contains("mefserve_open_files"));
    }

    #[tokio::test]
    async fn healthz_answers_liveness_probes() {
        let app = create_metrics_router();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn render_includes_every_registered_cache_metric() {
        metrics::init();
        let text = render().unwrap();
        for name in [
            "mefserve_cache_misses_total",
            "mefserve_cache_evictions_total",
            "mefserve_cache_invalidations_total",
            "mefserve_cache_entries",
        ] {
            assert!(text.contains(name), "missing metric {name}");
        }
    }
}
