//! HTTP middleware.

pub mod activity;

pub use activity::track_requests;
