//! KPI API
//!
//! Serves the KPI metrics library over HTTP.

use common::config::ObservabilityConfig;
use common::logging::init_tracing;
use kpi_api::config::Config;
use kpi_api::routes::{self, AppState};
use kpi_metrics::{BackendKind, MetricsContext};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

const LOG_TARGETS: &[&str] = &["kpi_api", "kpi_metrics", "tower_http"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&ObservabilityConfig::default(), LOG_TARGETS);
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    init_tracing(&config.metrics.observability, LOG_TARGETS);

    info!(
        bind_address = %config.bind_address,
        namespace = %config.namespace,
        "Starting KPI API"
    );

    let ctx = MetricsContext::new(
        BackendKind::Prometheus,
        &config.namespace,
        config.metrics.clone(),
    )?;

    if let Some(path) = &config.kpi_file {
        let loaded = ctx.load_kpis(path).map_err(|e| {
            error!(path = %path.display(), "Failed to load KPI catalog: {}", e);
            e
        })?;
        let registered = ctx.register_metrics()?;
        info!(
            path = %path.display(),
            loaded,
            registered = registered.len(),
            "KPI catalog registered"
        );
    } else {
        warn!("KPI_API_KPI_FILE not set, starting with an empty catalog");
    }

    let state = Arc::new(AppState { ctx: Arc::new(ctx) });
    let app = routes::build_routes(state);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("KPI API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.drain_seconds))
        .await?;

    info!("KPI API shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal(drain_secs: u64) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (KPI_API_DRAIN_SECONDS=0)");
    }
}
