//! Configuration management module.
//!
//! Supports loading configuration from:
//! - TOML files (config/default.toml, config/{profile}.toml)
//! - Environment variables with `LBDRAIN__<SECTION>__<KEY>` pattern

mod health;
mod server;

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use health::{HealthConfig, HealthMode};
pub use server::ServerConfig;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Health endpoint and drain configuration.
    #[serde(default)]
    pub health: HealthConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from `./config` and the environment.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. `.env` (if present, into the process environment)
    /// 2. `config/default.toml`
    /// 3. `config/{LBDRAIN_PROFILE}.toml` (if `LBDRAIN_PROFILE` is set)
    /// 4. Environment variables with `LBDRAIN__` prefix
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::load_from("config")
    }

    /// Load configuration from files in `dir` and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load_from(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();

        // Determine profile
        let profile = std::env::var("LBDRAIN_PROFILE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
            .add_source(File::with_name(&dir.join(&profile).to_string_lossy()).required(false))
            // LBDRAIN__HEALTH__QUIESCENCE_WINDOW_MS=5000 -> health.quiescence_window_ms = 5000
            .add_source(
                Environment::with_prefix("LBDRAIN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("server.port cannot be 0".to_string()));
        }

        self.health
            .drain_config()
            .validate()
            .map_err(|e| ConfigError::Message(format!("health: {e}")))?;

        if self.observability.metrics_enabled && self.observability.metrics_path == self.health.path
        {
            return Err(ConfigError::Message(
                "observability.metrics_path collides with health.path".to_string(),
            ));
        }

        Ok(())
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "text" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Enable Prometheus metrics endpoint.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,

    /// Metrics endpoint path.
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

const fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics_enabled: true,
            metrics_path: default_metrics_path(),
        }
    }
}
