//! Builder for test bearer tokens.
//!
//! Produces HS256-signed tokens that a `TokenVerifier` built from the
//! same secret accepts.

use crate::test_ids::TEST_AUTH_SECRET;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use signaling_controller::auth::Claims;

/// Builder for creating test tokens.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("user-hana")
///     .build();
/// ```
pub struct TestTokenBuilder {
    sub: String,
    role: Option<String>,
    exp: i64,
    iat: i64,
    secret: String,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: "test-subject".to_string(),
            role: None,
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            secret: TEST_AUTH_SECRET.to_string(),
        }
    }

    /// Set the subject (the stable user id).
    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Grant the platform admin role.
    pub fn as_admin(mut self) -> Self {
        self.role = Some("admin".to_string());
        self
    }

    /// Set expiration in seconds from now (negative for expired tokens).
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Sign with a different secret (for negative tests).
    pub fn with_secret(mut self, secret: &str) -> Self {
        self.secret = secret.to_string();
        self
    }

    /// Build the signed token.
    pub fn build(self) -> String {
        let claims = Claims {
            sub: self.sub,
            exp: self.exp,
            iat: self.iat,
            role: self.role,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .expect("test token encoding should not fail")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
