//! Action endpoint: `POST /v1/meetings/actions`.
//!
//! Accepts `{ action, meetingId, targetUserId?, data? }`, authenticated
//! via bearer token, and answers `{ "success": true }` or
//! `{ "error": ..., "status": ... }`. Authentication is checked before
//! anything else; no state is touched for an unauthenticated request.

use crate::actors::Caller;
use crate::auth;
use crate::errors::ScError;
use crate::protocol::{ActionAck, ActionKind, ActionRequest};
use crate::routes::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use common::types::UserId;
use std::sync::Arc;
use tracing::instrument;

/// Handler for `POST /v1/meetings/actions`.
#[instrument(skip_all, name = "sc.handlers.action")]
pub async fn submit_action(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ActionAck>, ScError> {
    let token = auth::bearer_token(&headers)
        .ok_or_else(|| ScError::Unauthorized("missing bearer token".to_string()))?;
    let claims = state.verifier.verify(token)?;

    let request: ActionRequest = serde_json::from_slice(&body)
        .map_err(|e| ScError::BadRequest(format!("malformed request: {e}")))?;

    let meeting_id = request
        .meeting_id
        .clone()
        .ok_or_else(|| ScError::BadRequest("missing meetingId".to_string()))?;

    if request.kind() == ActionKind::Unknown {
        return Err(ScError::InvalidAction(request.action.clone()));
    }

    let caller = Caller {
        user_id: UserId::new(claims.sub.clone()),
        is_admin: claims.is_admin(),
    };

    state.supervisor.dispatch(&meeting_id, caller, request).await?;
    Ok(Json(ActionAck::ok()))
}
