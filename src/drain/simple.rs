//! Always-ready health policy.
//!
//! For services that are not behind a load balancer: the endpoint answers
//! `200 ok` for the whole process lifetime and `stop()` returns at once.

use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::drain::monitor::ActivityMonitor;
use crate::drain::traits::{DrainPhase, HealthCheck, HealthResponse, ProbeOrigin};
use crate::error::DrainResult;

/// Health policy with no drain behaviour.
#[derive(Debug)]
pub struct SimpleHealth {
    path: String,
    phase: AtomicU8,
}

impl SimpleHealth {
    /// Create a policy serving at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            phase: AtomicU8::new(DrainPhase::Init as u8),
        }
    }
}

#[async_trait]
impl HealthCheck for SimpleHealth {
    fn path(&self) -> &str {
        &self.path
    }

    fn start(&self, _monitor: ActivityMonitor) {
        match self.phase.compare_exchange(
            DrainPhase::Init as u8,
            DrainPhase::Ready as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => info!(path = %self.path, "Simple health check ready"),
            Err(current) => warn!(
                phase = %DrainPhase::from_u8(current),
                "Simple health check start ignored"
            ),
        }
    }

    async fn stop(&self) -> DrainResult<()> {
        self.phase.store(DrainPhase::Done as u8, Ordering::Release);
        Ok(())
    }

    fn handle(&self, _origin: &ProbeOrigin) -> HealthResponse {
        HealthResponse::READY
    }

    fn phase(&self) -> DrainPhase {
        DrainPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn policy_name(&self) -> &'static str {
        "simple"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_ready_even_after_stop() {
        let health = SimpleHealth::new("/status.txt");
        health.start(ActivityMonitor::new());
        assert!(health.handle(&ProbeOrigin::lb("10.0.0.1")).is_ready());

        health.stop().await.unwrap();
        assert_eq!(health.phase(), DrainPhase::Done);
        assert_eq!(
            health.handle(&ProbeOrigin::lb("10.0.0.1")),
            HealthResponse::READY
        );
    }

    #[tokio::test]
    async fn test_start_after_stop_keeps_done() {
        let health = SimpleHealth::new("/status.txt");
        health.start(ActivityMonitor::new());
        health.start(ActivityMonitor::new());
        assert_eq!(health.phase(), DrainPhase::Ready);

        health.stop().await.unwrap();
        health.start(ActivityMonitor::new());
        assert_eq!(health.phase(), DrainPhase::Done);
    }

    #[tokio::test]
    async fn test_stop_ignores_inflight_requests() {
        let health = SimpleHealth::new("/status.txt");
        let monitor = ActivityMonitor::new();
        health.start(monitor.clone());
        monitor.begin();

        health.stop().await.unwrap();
        assert_eq!(monitor.count(), 1);
    }
}
