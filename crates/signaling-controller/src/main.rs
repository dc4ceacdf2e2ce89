//! Signaling Controller binary.
//!
//! # Startup Flow
//!
//! 1. Initialize tracing
//! 2. Load configuration from environment
//! 3. Install the Prometheus metrics recorder
//! 4. Build the connection registry and spawn the session supervisor
//! 5. Build the directory collaborator clients
//! 6. Bind the listener, then serve the router (channel + actions +
//!    health + metrics)
//! 7. Wait for Ctrl+C/SIGTERM, mark not-ready, cancel the supervisor and
//!    drain

#![warn(clippy::pedantic)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use signaling_controller::actors::SessionSupervisorHandle;
use signaling_controller::auth::TokenVerifier;
use signaling_controller::config::Config;
use signaling_controller::directory::{
    directory_client, HttpMeetingDirectory, HttpUserDirectory,
};
use signaling_controller::observability::HealthState;
use signaling_controller::registry::ConnectionRegistry;
use signaling_controller::routes::{build_routes, AppState};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signaling_controller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Signaling Controller");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        instance_id = %config.instance_id,
        bind_address = %config.bind_address,
        meeting_directory_url = %config.meeting_directory_url,
        user_directory_url = %config.user_directory_url,
        channel_capacity = config.channel_capacity,
        "Configuration loaded successfully"
    );

    // Install the Prometheus recorder before any metrics are recorded
    let prometheus_handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        format!("Failed to install Prometheus metrics recorder: {e}")
    })?;

    let health_state = Arc::new(HealthState::new());

    // Connection registry and actor system
    let registry = Arc::new(ConnectionRegistry::new());
    let supervisor = SessionSupervisorHandle::new(Arc::clone(&registry));
    info!("Actor system initialized");

    // Directory collaborator clients
    let http_client = directory_client(config.collaborator_timeout).map_err(|e| {
        error!(error = %e, "Failed to build directory HTTP client");
        format!("Failed to build directory HTTP client: {e}")
    })?;
    let meeting_directory = Arc::new(HttpMeetingDirectory::new(
        http_client.clone(),
        config.meeting_directory_url.clone(),
    ));
    let user_directory = Arc::new(HttpUserDirectory::new(
        http_client,
        config.user_directory_url.clone(),
    ));

    let verifier = TokenVerifier::new(&config.auth_token_secret);

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState {
        config,
        supervisor: supervisor.clone(),
        verifier,
        meeting_directory,
        user_directory,
    });

    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );

    let app = build_routes(state, Arc::clone(&health_state)).merge(metrics_router);

    // Bind before spawning anything dependent, to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %bind_address, "Failed to bind listener");
            format!("Failed to bind {bind_address}: {e}")
        })?;
    info!(addr = %bind_address, "Listener bound successfully");

    health_state.set_ready();

    let shutdown_token = supervisor.child_token();
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let token = shutdown_token.clone();
        async move {
            token.cancelled().await;
            info!("Server shutting down");
        }
    });

    let server_task = tokio::spawn(async move {
        if let Err(e) = server.await {
            error!(error = %e, "Server failed");
        }
    });

    info!("Signaling Controller running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Stop accepting traffic, then cancel the actor system; cancellation
    // fans out to every session actor and drops every push channel.
    health_state.set_not_ready();
    supervisor.cancel();

    match tokio::time::timeout(Duration::from_secs(10), server_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Server task ended abnormally"),
        Err(_) => warn!("Server shutdown timed out"),
    }

    info!("Signaling Controller shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable
/// because without signal handlers the service cannot shut down
/// gracefully.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
