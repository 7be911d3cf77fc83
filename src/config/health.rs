//! Health endpoint and drain configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::drain::DrainConfig;
use crate::drain::coordinator::{
    DEFAULT_PATH, DEFAULT_POLL_INTERVAL, DEFAULT_QUIESCENCE_WINDOW, DEFAULT_SHUTDOWN_TIMEOUT,
};

/// Health policy selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthMode {
    /// Load balancer aware drain controller.
    #[default]
    Drain,
    /// Always ready, no drain.
    Simple,
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Which policy serves the endpoint.
    #[serde(default)]
    pub mode: HealthMode,

    /// Endpoint path.
    #[serde(default = "default_path")]
    pub path: String,

    /// Hard drain timeout in milliseconds.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Quiescence poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Quiescence window in milliseconds.
    #[serde(default = "default_quiescence_window_ms")]
    pub quiescence_window_ms: u64,
}

fn default_path() -> String {
    DEFAULT_PATH.to_string()
}

#[allow(clippy::cast_possible_truncation)]
const fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64
}

#[allow(clippy::cast_possible_truncation)]
const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

#[allow(clippy::cast_possible_truncation)]
const fn default_quiescence_window_ms() -> u64 {
    DEFAULT_QUIESCENCE_WINDOW.as_millis() as u64
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            mode: HealthMode::default(),
            path: default_path(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            quiescence_window_ms: default_quiescence_window_ms(),
        }
    }
}

impl HealthConfig {
    /// Drain coordinator settings derived from this section.
    #[must_use]
    pub fn drain_config(&self) -> DrainConfig {
        DrainConfig {
            path: self.path.clone(),
            shutdown_timeout: Duration::from_millis(self.shutdown_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            quiescence_window: Duration::from_millis(self.quiescence_window_ms),
        }
    }
}
