//! Signaling Controller configuration.
//!
//! Configuration is loaded from environment variables. The signing secret
//! is held in a `SecretString`, so a derived `Debug` cannot leak it.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default per-connection outbound frame buffer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Default interval between server-initiated pings on a push channel.
pub const DEFAULT_PING_INTERVAL_SECONDS: u64 = 20;

/// Default liveness deadline: a channel with no inbound traffic (pongs
/// included) for this long is treated as dead.
pub const DEFAULT_LIVENESS_TIMEOUT_SECONDS: u64 = 60;

/// Default request timeout for the action endpoint.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Default timeout for one directory lookup.
pub const DEFAULT_COLLABORATOR_TIMEOUT_MS: u64 = 2_000;

/// Default instance ID prefix.
pub const DEFAULT_INSTANCE_ID_PREFIX: &str = "sc";

/// Signaling Controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Unique identifier for this instance.
    pub instance_id: String,

    /// HS256 signing secret shared with the authentication provider.
    pub auth_token_secret: SecretString,

    /// Base URL of the meeting-metadata store.
    pub meeting_directory_url: String,

    /// Base URL of the user-profile store.
    pub user_directory_url: String,

    /// Timeout for one directory lookup.
    pub collaborator_timeout: Duration,

    /// Per-connection outbound frame buffer.
    pub channel_capacity: usize,

    /// Interval between server-initiated pings on a push channel.
    pub ping_interval: Duration,

    /// Liveness deadline for a push channel.
    pub liveness_timeout: Duration,

    /// Request timeout for the action endpoint.
    pub request_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let auth_token_secret = SecretString::from(
            vars.get("SC_AUTH_TOKEN_SECRET")
                .ok_or_else(|| ConfigError::MissingEnvVar("SC_AUTH_TOKEN_SECRET".to_string()))?
                .clone(),
        );

        let meeting_directory_url = vars
            .get("SC_MEETING_DIRECTORY_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("SC_MEETING_DIRECTORY_URL".to_string()))?
            .clone();

        let user_directory_url = vars
            .get("SC_USER_DIRECTORY_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("SC_USER_DIRECTORY_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("SC_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let collaborator_timeout = Duration::from_millis(
            vars.get("SC_COLLABORATOR_TIMEOUT_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_COLLABORATOR_TIMEOUT_MS),
        );

        let channel_capacity = vars
            .get("SC_CHANNEL_CAPACITY")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CHANNEL_CAPACITY);

        let ping_interval = Duration::from_secs(
            vars.get("SC_PING_INTERVAL_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PING_INTERVAL_SECONDS),
        );

        let liveness_timeout = Duration::from_secs(
            vars.get("SC_LIVENESS_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_LIVENESS_TIMEOUT_SECONDS),
        );

        let request_timeout = Duration::from_secs(
            vars.get("SC_REQUEST_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        );

        let instance_id = vars.get("SC_INSTANCE_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_INSTANCE_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        if channel_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "SC_CHANNEL_CAPACITY must be at least 1".to_string(),
            ));
        }

        Ok(Config {
            bind_address,
            instance_id,
            auth_token_secret,
            meeting_directory_url,
            user_directory_url,
            collaborator_timeout,
            channel_capacity,
            ping_interval,
            liveness_timeout,
            request_timeout,
        })
    }
}
