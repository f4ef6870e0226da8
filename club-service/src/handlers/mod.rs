//! HTTP handlers for club-service.

pub mod attendance;
pub mod context;
pub mod health;
pub mod permissions;

pub use context::Caller;
pub use health::{health_check, metrics_endpoint, readiness_check};
