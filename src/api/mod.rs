//! API layer module.
//!
//! HTTP handlers, middleware, and routing for the health endpoint and the
//! service shell around it.

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
