//! Signaling Controller error types.
//!
//! All request-handling errors map to HTTP status codes via the
//! `IntoResponse` impl and are returned to the caller as
//! `{ "error": ..., "status": ... }`. Internal details (collaborator
//! failures, channel plumbing) are logged server-side and replaced with a
//! generic message before reaching clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Signaling Controller error type.
///
/// Maps to the action-endpoint status codes:
/// - `Unauthorized`: 401
/// - `BadRequest`, `InvalidAction`: 400
/// - `Forbidden`: 403
/// - `NotConnected`, `NotFound`: 404
/// - `CollaboratorUnavailable`, `Internal`: 500
#[derive(Debug, Error)]
pub enum ScError {
    /// No verified identity on the request.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A required field is missing or malformed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The caller is not allowed to perform this action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The target identity has no live push channel.
    #[error("Target not connected")]
    NotConnected,

    /// Meeting, session or target not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unrecognized action tag.
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// A meeting-directory or user-directory lookup failed. This never
    /// reaches clients as a hard failure; callers apply the documented
    /// fallback instead. The variant exists for the rare paths where no
    /// fallback applies.
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            ScError::Unauthorized(_) => 401,
            ScError::BadRequest(_) | ScError::InvalidAction(_) => 400,
            ScError::Forbidden(_) => 403,
            ScError::NotConnected | ScError::NotFound(_) => 404,
            ScError::CollaboratorUnavailable(_) | ScError::Internal(_) => 500,
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            ScError::Unauthorized(reason) => reason.clone(),
            ScError::BadRequest(reason) => reason.clone(),
            ScError::Forbidden(reason) => reason.clone(),
            ScError::NotConnected => "target not connected".to_string(),
            ScError::NotFound(resource) => resource.clone(),
            ScError::InvalidAction(action) => format!("unknown action: {action}"),
            ScError::CollaboratorUnavailable(_) | ScError::Internal(_) => {
                "an internal error occurred".to_string()
            }
        }
    }
}

/// Wire shape of an error response: `{ "error": ..., "status": ... }`.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for ScError {
    fn into_response(self) -> Response {
        match &self {
            ScError::CollaboratorUnavailable(detail) => {
                tracing::warn!(target: "sc.errors", detail = %detail, "Collaborator lookup failed");
            }
            ScError::Internal(detail) => {
                tracing::error!(target: "sc.errors", detail = %detail, "Internal error");
            }
            _ => {}
        }

        let status_code = self.status_code();
        let status = StatusCode::from_u16(status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: self.client_message(),
            status: status_code,
        };

        (status, Json(body)).into_response()
    }
}
