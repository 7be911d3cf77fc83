//! Health policy factory.
//!
//! Creates the configured health policy.

use std::sync::Arc;

use crate::config::{HealthConfig, HealthMode};
use crate::drain::coordinator::DrainCoordinator;
use crate::drain::simple::SimpleHealth;
use crate::drain::traits::HealthCheck;
use crate::error::DrainResult;

/// Create a health policy based on configuration.
///
/// # Errors
///
/// Returns `DrainError::InvalidConfig` if the drain settings are invalid.
pub fn create_health_check(config: &HealthConfig) -> DrainResult<Arc<dyn HealthCheck>> {
    let drain = config.drain_config();
    drain.validate()?;

    match config.mode {
        HealthMode::Drain => Ok(Arc::new(DrainCoordinator::new(drain)?)),
        HealthMode::Simple => Ok(Arc::new(SimpleHealth::new(drain.path))),
    }
}
