//! HTTP routes for the Signaling Controller.
//!
//! Defines the Axum router and application state.

use crate::actors::SessionSupervisorHandle;
use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::directory::{MeetingDirectory, UserDirectory};
use crate::handlers;
use crate::observability::{health_router, HealthState};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Session supervisor handle.
    pub supervisor: SessionSupervisorHandle,

    /// Bearer-token verifier.
    pub verifier: TokenVerifier,

    /// Meeting-metadata collaborator.
    pub meeting_directory: Arc<dyn MeetingDirectory>,

    /// User-profile collaborator.
    pub user_directory: Arc<dyn UserDirectory>,
}

/// Build the application routes.
///
/// - `GET /v1/meetings/{meeting_id}/channel` - push channel (no request
///   timeout: the connection is long-lived by design)
/// - `POST /v1/meetings/actions` - action endpoint, request-timeout bound
/// - `GET /health`, `GET /ready` - probes
pub fn build_routes(state: Arc<AppState>, health_state: Arc<HealthState>) -> Router {
    let action_routes = Router::new()
        .route("/v1/meetings/actions", post(handlers::action::submit_action))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .with_state(Arc::clone(&state));

    let channel_routes = Router::new()
        .route(
            "/v1/meetings/:meeting_id/channel",
            get(handlers::channel::open_channel),
        )
        .with_state(state);

    channel_routes
        .merge(action_routes)
        .merge(health_router(health_state))
        .layer(TraceLayer::new_for_http())
}
