//! Load balancer acknowledgement tracking.
//!
//! Every load balancer that probes the health endpoint gets an entry keyed by
//! its client identity. The entry holds the instant it was first told "not
//! ready", or `None` while it is still being told "ready". Shutdown may
//! proceed once every known load balancer has held a not-ready observation
//! for the quiescence window.
//!
//! The not-ready instant is sticky: a later not-ready probe does not move it.
//! Only a ready probe clears it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::drain::clock::Clock;

/// Per-load-balancer not-ready timestamps behind a single reader-writer lock.
pub struct LbAckTracker {
    entries: RwLock<HashMap<String, Option<Instant>>>,
    clock: Arc<dyn Clock>,
}

impl LbAckTracker {
    /// Create an empty tracker that stamps entries with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Record that `ip` was just told the service is ready.
    ///
    /// Deployer probes are ignored.
    pub fn note_ready(&self, ip: &str, deployer: bool) {
        if deployer {
            return;
        }

        self.entries.write().insert(ip.to_string(), None);
    }

    /// Record that `ip` was just told the service is not ready.
    ///
    /// The first not-ready instant wins until a ready probe resets it.
    /// Deployer probes are ignored.
    pub fn note_not_ready(&self, ip: &str, deployer: bool) {
        if deployer {
            return;
        }

        let mut entries = self.entries.write();
        let entry = entries.entry(ip.to_string()).or_insert(None);
        if entry.is_none() {
            let now = self.clock.now();
            *entry = Some(now);
            debug!(ip, "Load balancer observed not-ready");
        }
    }

    /// Whether any known load balancer may still route traffic here.
    ///
    /// True if some entry was last told "ready", or was told "not ready"
    /// less than `window` before `now`.
    #[must_use]
    pub fn any_active(&self, now: Instant, window: Duration) -> bool {
        self.entries.read().values().any(|entry| match entry {
            None => true,
            Some(since) => now.saturating_duration_since(*since) < window,
        })
    }

    /// Entry for `ip`: `None` if unknown, `Some(None)` if last told ready,
    /// `Some(Some(t))` if told not-ready since `t`.
    #[must_use]
    pub fn get(&self, ip: &str) -> Option<Option<Instant>> {
        self.entries.read().get(ip).copied()
    }

    /// Number of known load balancers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no load balancer has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for LbAckTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LbAckTracker")
            .field("entries", &*self.entries.read())
            .finish_non_exhaustive()
    }
}
