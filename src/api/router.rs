//! Router setup and configuration.

use axum::{
    Router, middleware,
    routing::{any, get},
};
use tower_http::trace::TraceLayer;

use crate::api::handlers::health;
use crate::api::middleware::activity::track_requests;
use crate::api::state::AppState;

/// Create the main application router.
///
/// Every route, the health probe included, is counted by the activity
/// middleware.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route(state.health.path(), any(health::probe))
        .route("/health", get(health::liveness));

    if state.config.observability.metrics_enabled {
        router = router.route(&state.config.observability.metrics_path, get(health::metrics));
    }

    router
        .layer(middleware::from_fn_with_state(
            state.monitor.clone(),
            track_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
