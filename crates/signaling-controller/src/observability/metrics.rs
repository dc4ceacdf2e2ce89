//! Metric recording helpers.
//!
//! All metrics go through the [`metrics`] facade and are rendered by the
//! Prometheus exporter installed at startup. Names are centralized here so
//! dashboards have one place to look.

use metrics::{counter, gauge};

/// Active push connections (gauge).
pub const CONNECTIONS_ACTIVE: &str = "sc_connections_active";
/// Active sessions (gauge).
pub const SESSIONS_ACTIVE: &str = "sc_sessions_active";
/// Frames handed to outbound channels (counter).
pub const FRAMES_SENT: &str = "sc_frames_sent_total";
/// Frames dropped for slow consumers (counter).
pub const FRAMES_DROPPED: &str = "sc_frames_dropped_total";
/// Sends that hit a closed channel (counter).
pub const SEND_FAILURES: &str = "sc_send_failures_total";
/// Connections pruned after a dead-channel observation (counter).
pub const CONNECTIONS_PRUNED: &str = "sc_connections_pruned_total";
/// Actions dispatched to session actors (counter).
pub const ACTIONS_DISPATCHED: &str = "sc_actions_total";
/// Joins that fell back to first-joiner-is-host (counter).
pub const HOST_FALLBACKS: &str = "sc_host_fallbacks_total";

pub fn connection_opened() {
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

pub fn connection_closed() {
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

pub fn session_created() {
    gauge!(SESSIONS_ACTIVE).increment(1.0);
}

pub fn session_removed() {
    gauge!(SESSIONS_ACTIVE).decrement(1.0);
}

pub fn frame_sent() {
    counter!(FRAMES_SENT).increment(1);
}

pub fn frame_dropped() {
    counter!(FRAMES_DROPPED).increment(1);
}

pub fn send_failure() {
    counter!(SEND_FAILURES).increment(1);
}

pub fn connection_pruned() {
    counter!(CONNECTIONS_PRUNED).increment(1);
}

pub fn action_dispatched(action: &str) {
    counter!(ACTIONS_DISPATCHED, "action" => action.to_string()).increment(1);
}

pub fn host_fallback() {
    counter!(HOST_FALLBACKS).increment(1);
}
