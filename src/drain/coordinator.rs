//! Load balancer aware drain coordinator.
//!
//! ```text
//!            start(m)                 stop()
//! INIT ─────────────▶ READY ─────────────▶ DRAINING ──┬─▶ DONE      (quiesced)
//!                                                     └─▶ TIMED_OUT (hard timeout)
//! ```
//!
//! While ready the health endpoint answers `200 ok`. Once `stop()` begins it
//! answers `503 service unavailable`, and `stop()` waits until no request is
//! in flight and every known load balancer has been told "not ready" for at
//! least the quiescence window, or until the hard timeout.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::drain::clock::{Clock, TokioClock};
use crate::drain::monitor::ActivityMonitor;
use crate::drain::tracker::LbAckTracker;
use crate::drain::traits::{DrainPhase, HealthCheck, HealthResponse, ProbeOrigin};
use crate::error::{DrainError, DrainResult};

/// Default health endpoint path.
pub const DEFAULT_PATH: &str = "/status.txt";

/// Default hard limit on `stop()`.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(180);

/// Default delay between quiescence checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default time every load balancer must have seen "not ready".
pub const DEFAULT_QUIESCENCE_WINDOW: Duration = Duration::from_secs(15);

/// Drain coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainConfig {
    /// Health endpoint path.
    pub path: String,
    /// Hard limit on how long `stop()` may wait.
    pub shutdown_timeout: Duration,
    /// Delay between quiescence checks.
    pub poll_interval: Duration,
    /// Minimum time every load balancer must have been told "not ready".
    pub quiescence_window: Duration,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            quiescence_window: DEFAULT_QUIESCENCE_WINDOW,
        }
    }
}

impl DrainConfig {
    /// Check the settings.
    ///
    /// # Errors
    ///
    /// Returns `DrainError::InvalidConfig` if a duration is zero, the poll
    /// interval is not shorter than the shutdown timeout, or the path is not
    /// absolute.
    pub fn validate(&self) -> DrainResult<()> {
        if !self.path.starts_with('/') {
            return Err(DrainError::InvalidConfig(format!(
                "path must start with '/': {:?}",
                self.path
            )));
        }
        for (name, value) in [
            ("shutdown_timeout", self.shutdown_timeout),
            ("poll_interval", self.poll_interval),
            ("quiescence_window", self.quiescence_window),
        ] {
            if value.is_zero() {
                return Err(DrainError::InvalidConfig(format!("{name} must be positive")));
            }
        }
        if self.poll_interval >= self.shutdown_timeout {
            return Err(DrainError::InvalidConfig(
                "poll_interval must be shorter than shutdown_timeout".to_string(),
            ));
        }
        Ok(())
    }
}

struct Inner {
    config: DrainConfig,
    phase: AtomicU8,
    monitor: OnceLock<ActivityMonitor>,
    tracker: LbAckTracker,
    clock: Arc<dyn Clock>,
}

impl Inner {
    fn phase(&self) -> DrainPhase {
        DrainPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: DrainPhase) {
        self.phase.store(phase as u8, Ordering::Release);
        metrics::gauge!("lbdrain_drain_phase").set(f64::from(phase as u8));
    }

    fn inflight(&self) -> u32 {
        self.monitor.get().map_or(0, ActivityMonitor::count)
    }

    fn lb_active(&self) -> bool {
        self.tracker
            .any_active(self.clock.now(), self.config.quiescence_window)
    }

    fn quiescent(&self) -> bool {
        let monitor_idle = self
            .monitor
            .get()
            .is_none_or(|m| !m.active() && m.count() == 0);
        monitor_idle && !self.lb_active()
    }
}

/// Graceful-shutdown coordinator for services behind load balancers.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct DrainCoordinator {
    inner: Arc<Inner>,
}

impl DrainCoordinator {
    /// Create a coordinator driven by the tokio clock.
    ///
    /// # Errors
    ///
    /// Returns `DrainError::InvalidConfig` if `config` fails validation.
    pub fn new(config: DrainConfig) -> DrainResult<Self> {
        Self::with_clock(config, Arc::new(TokioClock))
    }

    /// Create a coordinator with an explicit clock.
    ///
    /// Only not-ready timestamps and the quiescence window check read `clock`.
    /// The poll interval and the shutdown timeout still run on tokio time.
    ///
    /// # Errors
    ///
    /// Returns `DrainError::InvalidConfig` if `config` fails validation.
    pub fn with_clock(config: DrainConfig, clock: Arc<dyn Clock>) -> DrainResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                phase: AtomicU8::new(DrainPhase::Init as u8),
                monitor: OnceLock::new(),
                tracker: LbAckTracker::new(Arc::clone(&clock)),
                clock,
            }),
        })
    }

    /// Configured health endpoint path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.inner.config.path
    }

    /// Settings in use.
    #[must_use]
    pub fn config(&self) -> &DrainConfig {
        &self.inner.config
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> DrainPhase {
        self.inner.phase()
    }

    /// Whether probes are currently answered with 200.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.phase() == DrainPhase::Ready
    }

    /// Monitor passed to [`start`](Self::start), if any.
    #[must_use]
    pub fn monitor(&self) -> Option<&ActivityMonitor> {
        self.inner.monitor.get()
    }

    /// Load balancer acknowledgement state.
    #[must_use]
    pub fn tracker(&self) -> &LbAckTracker {
        &self.inner.tracker
    }

    /// Attach the request monitor and start advertising ready.
    ///
    /// Must be called exactly once. A repeated call, or a call after `stop()`,
    /// is logged and otherwise ignored; the coordinator never returns to ready.
    pub fn start(&self, monitor: ActivityMonitor) {
        if self.inner.monitor.set(monitor).is_err() {
            warn!("Drain coordinator already has a monitor; ignoring");
        }

        match self.inner.phase.compare_exchange(
            DrainPhase::Init as u8,
            DrainPhase::Ready as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                metrics::gauge!("lbdrain_drain_phase").set(f64::from(DrainPhase::Ready as u8));
                info!(path = %self.path(), "Drain coordinator ready");
            }
            Err(current) => {
                warn!(
                    phase = %DrainPhase::from_u8(current),
                    "Drain coordinator start ignored"
                );
            }
        }
    }

    /// Advertise not-ready and wait until it is safe to terminate.
    ///
    /// Returns once no request is in flight and every known load balancer
    /// has been told "not ready" for the quiescence window. Probes keep being
    /// served while this waits.
    ///
    /// # Errors
    ///
    /// Returns `DrainError::Timeout` with the in-flight count and load
    /// balancer state observed when the shutdown timeout fired.
    pub async fn stop(&self) -> DrainResult<()> {
        let started = self.inner.clock.now();
        self.inner.set_phase(DrainPhase::Draining);

        let config = &self.inner.config;
        warn!(
            inflight = self.inner.inflight(),
            load_balancers = self.inner.tracker.len(),
            timeout = ?config.shutdown_timeout,
            window = ?config.quiescence_window,
            "Draining: advertising not-ready"
        );

        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let worker = tokio::spawn(async move {
            loop {
                if inner.quiescent() {
                    let _ = tx.send(());
                    return;
                }
                debug!(
                    inflight = inner.inflight(),
                    lb_active = inner.lb_active(),
                    "Waiting for quiescence"
                );
                tokio::time::sleep(inner.config.poll_interval).await;
            }
        });

        let quiesced = async {
            if rx.await.is_err() {
                // Worker died without signalling; only the timeout can end the wait.
                std::future::pending::<()>().await;
            }
        };

        let result = tokio::select! {
            () = quiesced => Ok(()),
            () = tokio::time::sleep(config.shutdown_timeout) => Err(DrainError::Timeout {
                inflight: self.inner.inflight(),
                lb_active: self.inner.lb_active(),
            }),
        };
        worker.abort();

        let elapsed = self.inner.clock.now().saturating_duration_since(started);
        metrics::histogram!("lbdrain_drain_duration_seconds").record(elapsed.as_secs_f64());

        match &result {
            Ok(()) => {
                self.inner.set_phase(DrainPhase::Done);
                info!(elapsed = ?elapsed, "Drain complete");
            }
            Err(err) => {
                self.inner.set_phase(DrainPhase::TimedOut);
                warn!(elapsed = ?elapsed, error = %err, "Drain timed out");
            }
        }

        result
    }

    /// Serve one health probe.
    ///
    /// The phase is sampled once. Deployer probes get the same status but do
    /// not update the tracker, and neither do probes without an identity.
    #[must_use]
    pub fn handle(&self, origin: &ProbeOrigin) -> HealthResponse {
        let ready = self.is_ready();
        let response = if ready {
            HealthResponse::READY
        } else {
            HealthResponse::UNAVAILABLE
        };

        if let Some(ip) = origin.identity.as_deref() {
            if ready {
                self.inner.tracker.note_ready(ip, origin.deployer);
            } else {
                self.inner.tracker.note_not_ready(ip, origin.deployer);
            }
        }

        response
    }
}

impl std::fmt::Debug for DrainCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainCoordinator")
            .field("config", &self.inner.config)
            .field("phase", &self.phase())
            .field("tracker", &self.inner.tracker)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl HealthCheck for DrainCoordinator {
    fn path(&self) -> &str {
        Self::path(self)
    }

    fn start(&self, monitor: ActivityMonitor) {
        Self::start(self, monitor);
    }

    async fn stop(&self) -> DrainResult<()> {
        Self::stop(self).await
    }

    fn handle(&self, origin: &ProbeOrigin) -> HealthResponse {
        Self::handle(self, origin)
    }

    fn phase(&self) -> DrainPhase {
        Self::phase(self)
    }

    fn policy_name(&self) -> &'static str {
        "drain"
    }
}
