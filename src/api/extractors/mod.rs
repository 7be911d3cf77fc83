//! Request extractors.

pub mod origin;

pub use origin::{RemoteAddr, is_deployer, resolve_identity};
