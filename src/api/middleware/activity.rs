//! Request lifecycle middleware.
//!
//! Counts every request in the shared [`ActivityMonitor`] so the drain
//! coordinator knows when the last one has finished.

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use metrics::Gauge;

use crate::drain::ActivityMonitor;

const INFLIGHT_GAUGE: &str = "lbdrain_inflight_requests";

/// Holds one unit of the in-flight gauge until dropped.
struct InflightGauge(Gauge);

impl InflightGauge {
    fn acquire() -> Self {
        let gauge = metrics::gauge!(INFLIGHT_GAUGE);
        gauge.increment(1.0);
        Self(gauge)
    }
}

impl Drop for InflightGauge {
    fn drop(&mut self) {
        self.0.decrement(1.0);
    }
}

/// Middleware that wraps each request in `begin()` / `end()`.
///
/// The request ends once the handler has produced its response, or when the
/// future is dropped.
pub async fn track_requests(
    State(monitor): State<ActivityMonitor>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let _guard = monitor.track();
    let _gauge = InflightGauge::acquire();

    next.run(req).await
}
