//! Application state for Axum handlers.

use std::sync::Arc;

use axum::extract::FromRef;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::AppConfig;
use crate::drain::{ActivityMonitor, HealthCheck};

/// Shared application state.
#[derive(Clone, FromRef)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Health endpoint policy.
    pub health: Arc<dyn HealthCheck>,
    /// In-flight request counter shared with the health policy.
    pub monitor: ActivityMonitor,
    /// Prometheus render handle, when metrics are enabled.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        config: Arc<AppConfig>,
        health: Arc<dyn HealthCheck>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            config,
            health,
            monitor: ActivityMonitor::new(),
            metrics,
        }
    }
}
