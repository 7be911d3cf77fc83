//! Health policy trait definitions.
//!
//! A health policy owns the health endpoint and decides when the process is
//! allowed to exit. The host server only talks to `dyn HealthCheck`, so the
//! drain controller and the trivial policy are interchangeable.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::drain::monitor::ActivityMonitor;
use crate::error::DrainResult;

/// Body served while the service is ready.
pub const READY_BODY: &str = "ok";

/// Body served while the service is draining.
pub const UNAVAILABLE_BODY: &str = "service unavailable";

/// Who is probing the health endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOrigin {
    /// Resolved client identity, `None` when it could not be determined.
    pub identity: Option<String>,
    /// Probe comes from deployment tooling rather than a load balancer.
    pub deployer: bool,
}

impl ProbeOrigin {
    /// Probe from a load balancer with a known identity.
    #[must_use]
    pub fn lb(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            deployer: false,
        }
    }

    /// Probe from deployment tooling.
    #[must_use]
    pub fn deployer(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            deployer: true,
        }
    }
}

/// Status and body of a health probe response.
///
/// No `Content-Type` is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Exact response body.
    pub body: &'static str,
}

impl HealthResponse {
    /// 200 `ok`.
    pub const READY: Self = Self {
        status: StatusCode::OK,
        body: READY_BODY,
    };

    /// 503 `service unavailable`.
    pub const UNAVAILABLE: Self = Self {
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: UNAVAILABLE_BODY,
    };

    /// Whether this response tells the caller to route traffic here.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == StatusCode::OK
    }
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        (self.status, Body::from(self.body)).into_response()
    }
}

/// Lifecycle phase of a health policy. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DrainPhase {
    /// Constructed, not yet started.
    Init = 0,
    /// Advertising ready.
    Ready = 1,
    /// `stop()` in progress, advertising not-ready.
    Draining = 2,
    /// Drain finished with the service quiesced.
    Done = 3,
    /// Drain gave up at the hard timeout.
    TimedOut = 4,
}

impl DrainPhase {
    /// Decode a phase stored as `u8`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Init,
            1 => Self::Ready,
            2 => Self::Draining,
            3 => Self::Done,
            _ => Self::TimedOut,
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for DrainPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health endpoint policy.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Path the health handler should be mounted at.
    fn path(&self) -> &str;

    /// Arm the policy. Called exactly once, before traffic is accepted.
    fn start(&self, monitor: ActivityMonitor);

    /// Advertise not-ready and wait until it is safe to exit.
    ///
    /// # Errors
    ///
    /// Returns `DrainError::Timeout` if the service did not quiesce in time.
    async fn stop(&self) -> DrainResult<()>;

    /// Serve one probe.
    fn handle(&self, origin: &ProbeOrigin) -> HealthResponse;

    /// Current lifecycle phase.
    fn phase(&self) -> DrainPhase;

    /// Policy name for logs.
    fn policy_name(&self) -> &'static str;
}
