//! Graceful-shutdown drain controller.
//!
//! The pieces, leaves first:
//!
//! - [`ActivityMonitor`]: atomic count of in-flight requests
//! - [`LbAckTracker`]: which load balancers have seen "not ready", and since when
//! - [`DrainCoordinator`]: ready flag, health probe handling and the bounded
//!   shutdown wait
//!
//! [`SimpleHealth`] is the trivial policy for services without load balancers.

pub mod clock;
pub mod coordinator;
pub mod factory;
pub mod monitor;
pub mod simple;
pub mod tracker;
pub mod traits;

pub use clock::{Clock, ManualClock, TokioClock};
pub use coordinator::{DrainConfig, DrainCoordinator};
pub use factory::create_health_check;
pub use monitor::{ActivityMonitor, RequestGuard};
pub use simple::SimpleHealth;
pub use tracker::LbAckTracker;
pub use traits::{DrainPhase, HealthCheck, HealthResponse, ProbeOrigin};
