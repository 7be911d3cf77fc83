//! # LBDrain
//!
//! Graceful shutdown for HTTP services sitting behind load balancers.
//!
//! On shutdown the health endpoint flips to `503`, and the process only
//! exits once:
//!
//! - no request is in flight, and
//! - every load balancer that probed the endpoint has been answering `503`
//!   for the quiescence window,
//!
//! or the hard shutdown timeout expires.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                              Service                               │
//! ├────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌──────────────────┐   ┌─────────────────────┐  │
//! │  │  API Layer  │ → │ Drain Controller │ → │ Monitor / LB Tracker│  │
//! │  │   (Axum)    │   │  (HealthCheck)   │   │   (atomics, RwLock) │  │
//! │  └─────────────┘   └──────────────────┘   └─────────────────────┘  │
//! └────────────────────────────────────────────────────────────────────┘
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod drain;
pub mod error;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use crate::api::create_router;
use crate::api::state::AppState;
use crate::config::AppConfig;
use crate::drain::{HealthCheck, create_health_check};
use crate::error::AppError;

/// Run the service.
///
/// This function:
/// 1. Loads configuration from files and environment
/// 2. Initializes logging and the metrics recorder
/// 3. Creates the configured health policy
/// 4. Starts the HTTP server
/// 5. Drains on SIGTERM / Ctrl+C before closing the listener
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded
/// - The metrics recorder cannot be installed
/// - HTTP server fails to bind
pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load().map_err(AppError::Config)?;

    init_logging(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting LBDrain");

    let metrics = if config.observability.metrics_enabled {
        Some(install_metrics()?)
    } else {
        None
    };

    let health = create_health_check(&config.health).map_err(AppError::Drain)?;
    info!(
        policy = health.policy_name(),
        path = health.path(),
        "Health policy initialized"
    );

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr).await.map_err(AppError::Io)?;
    info!(%addr, "HTTP server listening");

    let state = AppState::new(Arc::new(config), health, metrics);
    serve(listener, state, shutdown_signal()).await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Serve `state` on `listener` until `shutdown` resolves and the drain ends.
///
/// The health policy is started before the first connection is accepted.
/// When `shutdown` resolves the policy's `stop()` runs while the server keeps
/// answering, and only then does the listener close. A drain timeout is
/// logged, not returned.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> error::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let health = Arc::clone(&state.health);
    health.start(state.monitor.clone());

    let app = create_router(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(drain_after(shutdown, health))
    .await?;

    Ok(())
}

async fn drain_after<F>(shutdown: F, health: Arc<dyn HealthCheck>)
where
    F: Future<Output = ()>,
{
    shutdown.await;

    if let Err(e) = health.stop().await {
        warn!(error = %e, "Shutting down before drain completed");
    }
}

/// Install the global Prometheus recorder.
fn install_metrics() -> error::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AppError::Metrics(e.to_string()))
}

/// Initialize logging based on configuration.
fn init_logging(config: &AppConfig) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.observability.log_format == "json" {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
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
        () = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
