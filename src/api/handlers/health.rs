//! Health check handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::api::state::AppState;
use crate::drain::{HealthCheck, HealthResponse, ProbeOrigin};

/// Load balancer health probe, served by the configured policy.
///
/// Works under any router whose state yields an `Arc<dyn HealthCheck>`, so
/// hosts can also mount it on routes carrying an `{ip}` variable.
pub async fn probe(
    State(health): State<Arc<dyn HealthCheck>>,
    origin: ProbeOrigin,
) -> HealthResponse {
    let response = health.handle(&origin);

    metrics::counter!(
        "lbdrain_health_probes_total",
        "status" => if response.is_ready() { "ok" } else { "unavailable" },
        "deployer" => if origin.deployer { "true" } else { "false" },
    )
    .increment(1);

    response
}

/// Liveness probe - always returns 200 if the process is serving.
pub async fn liveness(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "code": 0,
        "message": "success",
        "data": {
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "policy": state.health.policy_name(),
            "phase": state.health.phase().as_str(),
            "inflight": state.monitor.count()
        }
    }))
}

/// Prometheus metrics endpoint.
pub async fn metrics(State(state): State<AppState>) -> Response {
    state.metrics.as_ref().map_or_else(
        || (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
        |handle| handle.render().into_response(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, routing::any};
    use tower::ServiceExt;

    use crate::api::extractors::RemoteAddr;
    use crate::drain::{ActivityMonitor, DrainConfig, DrainCoordinator};

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn app(coordinator: &DrainCoordinator) -> Router {
        let health: Arc<dyn HealthCheck> = Arc::new(coordinator.clone());
        Router::new()
            .route("/status.txt", any(probe))
            .route("/lb/{ip}/status.txt", any(probe))
            .with_state(health)
    }

    #[tokio::test]
    async fn test_probe_ready_then_draining() {
        let coordinator = DrainCoordinator::new(DrainConfig::default()).unwrap();
        coordinator.start(ActivityMonitor::new());

        let request = Request::builder()
            .uri("/status.txt")
            .header("X-Real-IP", "10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let response = app(&coordinator).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("content-type").is_none());
        assert_eq!(body_text(response).await, "ok");
        assert_eq!(coordinator.tracker().get("10.0.0.1"), Some(None));

        let stopper = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.stop().await }
        });
        while coordinator.is_ready() {
            tokio::task::yield_now().await;
        }

        let request = Request::builder()
            .method("HEAD")
            .uri("/status.txt")
            .header("X-Real-IP", "10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let response = app(&coordinator).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(matches!(
            coordinator.tracker().get("10.0.0.1"),
            Some(Some(_))
        ));

        stopper.abort();
    }

    #[tokio::test]
    async fn test_probe_route_ip_overrides_header() {
        let coordinator = DrainCoordinator::new(DrainConfig::default()).unwrap();
        coordinator.start(ActivityMonitor::new());

        let request = Request::builder()
            .uri("/lb/10.1.1.1/status.txt")
            .header("X-Real-IP", "10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let response = app(&coordinator).oneshot(request).await.unwrap();
        assert_eq!(body_text(response).await, "ok");

        assert_eq!(coordinator.tracker().get("10.1.1.1"), Some(None));
        assert_eq!(coordinator.tracker().get("10.0.0.1"), None);
    }

    #[tokio::test]
    async fn test_probe_with_garbage_remote_addr() {
        let coordinator = DrainCoordinator::new(DrainConfig::default()).unwrap();
        coordinator.start(ActivityMonitor::new());

        let request = Request::builder()
            .uri("/status.txt")
            .extension(RemoteAddr("garbage".to_string()))
            .body(Body::empty())
            .unwrap();
        let response = app(&coordinator).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(coordinator.tracker().is_empty());
    }

    #[tokio::test]
    async fn test_deployer_probe_not_tracked() {
        let coordinator = DrainCoordinator::new(DrainConfig::default()).unwrap();
        coordinator.start(ActivityMonitor::new());

        let request = Request::builder()
            .uri("/status.txt?deployer=1")
            .header("X-Real-IP", "10.0.0.2")
            .body(Body::empty())
            .unwrap();
        let response = app(&coordinator).oneshot(request).await.unwrap();
        assert_eq!(body_text(response).await, "ok");
        assert!(coordinator.tracker().is_empty());
    }
}
