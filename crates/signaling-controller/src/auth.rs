//! Request authentication.
//!
//! The platform's authentication provider issues bearer tokens; this
//! module verifies them and yields the stable user id (`sub`) plus the
//! optional platform role. A request with no verifiable identity is
//! rejected with 401 before any session state is touched.
//!
//! The action endpoint carries the token in the `Authorization` header.
//! The push-channel handshake also accepts `?token=` because browsers
//! cannot set headers on a WebSocket upgrade.

use crate::errors::ScError;
use axum::http::HeaderMap;
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role value that grants platform-admin moderation rights.
const ADMIN_ROLE: &str = "admin";

/// Claims carried by a verified token.
///
/// The `sub` field is the stable user id and is redacted in Debug output.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the stable user id.
    pub sub: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Optional platform role (`"admin"` grants moderation everywhere).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Claims {
    /// Whether the token carries the platform admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("role", &self.role)
            .finish()
    }
}

/// Verifies bearer tokens against the shared signing secret.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Build a verifier from the configured signing secret.
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Verify a token and return its claims.
    ///
    /// The error message is intentionally generic; the actual reason is
    /// logged server-side.
    pub fn verify(&self, token: &str) -> Result<Claims, ScError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(target: "sc.auth", error = %e, "Token verification failed");
                ScError::Unauthorized("invalid or expired token".to_string())
            })
    }
}

/// Extract a bearer token from the `Authorization` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}
