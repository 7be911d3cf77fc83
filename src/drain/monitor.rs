//! In-flight request accounting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Lock-free counter of requests between `begin()` and `end()`.
///
/// Clones share the same counter, so the host server and the drain
/// coordinator can each hold one.
#[derive(Debug, Clone, Default)]
pub struct ActivityMonitor {
    inflight: Arc<AtomicU32>,
}

impl ActivityMonitor {
    /// Create a monitor with no requests in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of a request.
    pub fn begin(&self) {
        self.inflight.fetch_add(1, Ordering::AcqRel);
    }

    /// Record the end of a request.
    ///
    /// Must pair with an earlier [`begin`](Self::begin). An unmatched call
    /// saturates at zero instead of wrapping.
    pub fn end(&self) {
        let _ = self
            .inflight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Whether any request is in flight.
    #[must_use]
    pub fn active(&self) -> bool {
        self.count() > 0
    }

    /// Current number of in-flight requests.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.inflight.load(Ordering::Acquire)
    }

    /// Begin a request and return a guard that ends it when dropped.
    #[must_use = "the request ends as soon as the guard is dropped"]
    pub fn track(&self) -> RequestGuard {
        self.begin();
        RequestGuard {
            monitor: self.clone(),
        }
    }
}

/// Ends one in-flight request on drop.
#[derive(Debug)]
pub struct RequestGuard {
    monitor: ActivityMonitor,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.monitor.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_begin_end() {
        let monitor = ActivityMonitor::new();
        assert!(!monitor.active());

        monitor.begin();
        monitor.begin();
        assert_eq!(monitor.count(), 2);
        assert!(monitor.active());

        monitor.end();
        monitor.end();
        assert_eq!(monitor.count(), 0);
        assert!(!monitor.active());
    }

    #[test]
    fn test_unmatched_end_saturates() {
        let monitor = ActivityMonitor::new();
        monitor.end();
        assert_eq!(monitor.count(), 0);

        monitor.begin();
        assert_eq!(monitor.count(), 1);
    }

    #[test]
    fn test_clones_share_counter() {
        let monitor = ActivityMonitor::new();
        let other = monitor.clone();
        other.begin();
        assert_eq!(monitor.count(), 1);
    }

    #[test]
    fn test_guard_ends_on_drop() {
        let monitor = ActivityMonitor::new();
        {
            let _a = monitor.track();
            let _b = monitor.track();
            assert_eq!(monitor.count(), 2);
        }
        assert_eq!(monitor.count(), 0);
    }

    #[test]
    fn test_concurrent_threads() {
        let monitor = ActivityMonitor::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let monitor = monitor.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        monitor.begin();
                        monitor.end();
                    }
                    monitor.begin();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(monitor.count(), 8);
    }

    proptest! {
        #[test]
        fn prop_count_is_begins_minus_ends(
            per_thread in proptest::collection::vec((0u32..200, 0u32..200), 1..6)
        ) {
            let monitor = ActivityMonitor::new();
            let handles: Vec<_> = per_thread
                .iter()
                .map(|&(begins, ends)| {
                    let monitor = monitor.clone();
                    let ends = ends.min(begins);
                    std::thread::spawn(move || {
                        for i in 0..begins {
                            monitor.begin();
                            if i < ends {
                                monitor.end();
                            }
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            let expected: u32 = per_thread.iter().map(|&(b, e)| b - e.min(b)).sum();
            prop_assert_eq!(monitor.count(), expected);
        }
    }
}
