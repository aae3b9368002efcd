//! mefserve server entrypoint.
//!
//! ## Overview
//! Serves large multi-channel neurophysiology recordings (MEF3) to many
//! concurrent clients as fixed-duration signal chunks over gRPC, backed by
//! an LRU chunk cache with speculative prefetch.
//!
//! ## Configuration
//! Read once at startup from an optional TOML file plus environment
//! overrides:
//!
//! - `MEFSERVE_CONFIG`: config file path (default: ./mefserve.toml if present)
//! - `MEFSERVE_PORT`: gRPC listen port (default: 50051)
//! - `MEFSERVE_METRICS_PORT`: Prometheus exporter port (default: 9091)
//! - `MEFSERVE_N_PREFETCH`: segments decoded ahead of each access (default: 3)
//! - `MEFSERVE_CACHE_CAPACITY_MULTIPLIER`: cache capacity = n_prefetch x this (default: 5)
//! - `MEFSERVE_MAX_WORKERS`: prefetch pool size (default: 4)
//! - `MEFSERVE_LOG_LEVEL`: debug | info | warning | error | critical
//!
//! `RUST_LOG` takes precedence over `log_level` when set.
//!
//! ## Shutdown
//! SIGINT/SIGTERM trigger a graceful shutdown: open recordings are closed,
//! outstanding prefetch is drained, then the gRPC server stops accepting.

use std::sync::Arc;

use tonic::transport::Server;

use mefserve_decoder::{SignalDecoder, SyntheticDecoder, SyntheticRecording};
use mefserve_engine::FileManager;
use mefserve_proto::mefserve::mef_serve_server::MefServeServer;
use mefserve_server::{Config, DecoderBackend, MefServeService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    // Initialize logging: RUST_LOG wins, otherwise the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(config.log_level.filter_directive())
            }),
        )
        .init();

    mefserve_observability::init();

    let decoder: Arc<dyn SignalDecoder> = match config.decoder {
        DecoderBackend::Synthetic => {
            tracing::warn!("synthetic decoder backend: serving fabricated signals");
            Arc::new(
                SyntheticDecoder::new()
                    .with_default_recording(SyntheticRecording::uniform(8, 256.0, 3600.0)),
            )
        }
    };

    let manager = Arc::new(FileManager::new(decoder, config.engine_config()));
    let service = MefServeService::new(Arc::clone(&manager));

    // Metrics exporter on its own port.
    let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr).await?;
    tokio::spawn(async move {
        let router = mefserve_observability::exporter::create_metrics_router();
        if let Err(e) = axum::serve(metrics_listener, router).await {
            tracing::error!(error = %e, "metrics exporter failed");
        }
    });

    let bind_addr = format!("0.0.0.0:{}", config.port).parse()?;
    tracing::info!("mefserve starting on {}", bind_addr);
    tracing::info!("Configuration:");
    tracing::info!("  Metrics: {}", metrics_addr);
    tracing::info!("  Prefetch: {} ahead, {} workers", config.n_prefetch, config.max_workers);
    tracing::info!(
        "  Cache capacity: {} chunks",
        config.engine_config().cache_capacity()
    );

    // Set up graceful shutdown
    let shutdown_manager = Arc::clone(&manager);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
            },
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown");
            },
        }

        // Close open recordings and drain prefetch before the transport
        // stops.
        shutdown_manager.shutdown().await;

        let _ = shutdown_tx.send(());
    });

    Server::builder()
        .add_service(MefServeServer::new(service))
        .serve_with_shutdown(bind_addr, async {
            shutdown_rx.await.ok();
        })
        .await?;

    tracing::info!("mefserve shut down gracefully");

    Ok(())
}
