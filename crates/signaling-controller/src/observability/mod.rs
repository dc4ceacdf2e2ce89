//! Observability: health endpoints and metric helpers.

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
