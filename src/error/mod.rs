//! Error handling module.
//!
//! The drain core only ever surfaces [`DrainError`]; everything else it
//! encounters (unparseable probe origins, body write failures) is recovered
//! locally. [`AppError`] covers the service shell around it.

/// Errors produced by the drain controller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrainError {
    /// The hard shutdown timeout elapsed before the service quiesced.
    #[error("Drain timed out with {inflight} in-flight request(s), load balancers still active: {lb_active}")]
    Timeout {
        /// In-flight requests observed when the timer fired.
        inflight: u32,
        /// Whether any load balancer had not yet acknowledged the drain.
        lb_active: bool,
    },

    /// Drain settings rejected by validation.
    #[error("Invalid drain configuration: {0}")]
    InvalidConfig(String),
}

impl DrainError {
    /// Returns `true` if this is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Application-level error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration could not be loaded or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Socket or filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Drain controller error.
    #[error(transparent)]
    Drain(#[from] DrainError),

    /// Metrics recorder could not be installed.
    #[error("Metrics error: {0}")]
    Metrics(String),
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias using `DrainError`.
pub type DrainResult<T> = std::result::Result<T, DrainError>;
