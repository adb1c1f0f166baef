use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{error, info, warn};

use super::{
    services::{archive_metrics, health, ingest_log, list_archives, restore_archive},
    state::AppState,
    ws::ws_logs,
};
use crate::AnyError;
use crate::archive;
use crate::config::Config;
use crate::scheduler::Scheduler;
use crate::store::{FjallLogStore, create_health_job};

/// All HTTP routes over shared state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/logs", post(ingest_log))
        .route("/ws/logs", get(ws_logs))
        .route("/archives", get(list_archives))
        .route("/archives/metrics", get(archive_metrics))
        .route("/archives/{filename}", get(restore_archive))
        .with_state(state)
        // Transparently decompress gzip request bodies before the size check
        .layer(RequestDecompressionLayer::new())
}

/// Run the server and the background jobs until a shutdown signal arrives
pub async fn run(address: Option<SocketAddr>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Config::load().map_err(|e| format!("Failed to load config: {}", e))?;
    let address = address.unwrap_or(config.server.bind_addr);
    let shutdown_timeout = config.scheduler.shutdown_timeout.as_duration();
    let health_interval = config.scheduler.health_interval.as_duration();

    info!(path = %config.server.data_path.display(), "Opening log store");
    let store = FjallLogStore::open(&config.server.data_path)
        .map_err(|e| format!("Failed to open log store: {}", e))?;

    let storage = archive::from_config(&config.retention)
        .map_err(|e| format!("Failed to initialise archive storage: {}", e))?;

    let shutdown = CancellationToken::new();
    let state = AppState::new(config, store.clone(), storage, shutdown.clone())?;

    let scheduler = Scheduler::with_metrics(Arc::clone(&state.metrics));
    scheduler.register(state.retention.create_retention_job())?;
    scheduler.register(create_health_job(
        store.clone(),
        Arc::clone(&state.metrics),
        health_interval,
    ))?;
    scheduler.start(&shutdown)?;

    let listener = TcpListener::bind(address).await?;
    info!(%address, "logvault listening");

    let signal = shutdown.clone();
    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal.cancel();
        })
        .await?;

    if let Err(e) = scheduler.stop(shutdown_timeout).await {
        warn!(error = %e, "Background jobs did not stop cleanly");
    }
    store.persist()?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
