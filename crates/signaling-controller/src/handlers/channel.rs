//! Push channel: `GET /v1/meetings/{meeting_id}/channel`.
//!
//! One long-lived WebSocket per connected participant. The channel is
//! one-directional: the server pushes JSON event frames; clients act
//! through the action endpoint. Client-to-server traffic on the socket
//! only matters as a liveness signal (pongs, close frames).
//!
//! Collaborator lookups (meeting creator, joiner profile) happen here,
//! before the join message is sent, so the session actor never suspends
//! on an external call. Channel close — explicit, transport error, or
//! missed liveness deadline — funnels into exactly one disconnect signal.

use crate::actors::HostLookup;
use crate::auth;
use crate::errors::ScError;
use crate::protocol::{EventFrame, ProfileSummary};
use crate::routes::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use common::types::{MeetingId, UserId};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

/// Query parameters accepted on the channel handshake.
#[derive(Debug, Deserialize)]
pub struct ChannelQuery {
    /// Bearer token fallback; browsers cannot set headers on a WebSocket
    /// upgrade.
    pub token: Option<String>,
}

/// Handler for `GET /v1/meetings/{meeting_id}/channel`.
#[instrument(skip_all, name = "sc.handlers.channel", fields(meeting_id = %meeting_id))]
pub async fn open_channel(
    State(state): State<Arc<AppState>>,
    Path(meeting_id): Path<String>,
    Query(query): Query<ChannelQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ScError> {
    let token = auth::bearer_token(&headers)
        .map(str::to_string)
        .or(query.token)
        .ok_or_else(|| ScError::Unauthorized("missing credentials".to_string()))?;
    let claims = state.verifier.verify(&token)?;

    let meeting_id = MeetingId::new(meeting_id);
    let user_id = UserId::new(claims.sub.clone());

    // Both lookups are suspension points and must finish before the
    // session actor gets involved. Each degrades gracefully.
    let host_lookup = match state.meeting_directory.creator_of(&meeting_id).await {
        Ok(creator) => HostLookup::Creator(creator),
        Err(e) => {
            warn!(
                target: "sc.host_resolver",
                meeting_id = %meeting_id,
                error = %e,
                "Creator lookup failed, join will use fallback host policy"
            );
            HostLookup::Unavailable
        }
    };

    let profile = match state.user_directory.profile_of(&user_id).await {
        Ok(profile) => profile,
        Err(e) => {
            debug!(
                target: "sc.handlers.channel",
                error = %e,
                "Profile lookup failed, falling back to raw id"
            );
            ProfileSummary::bare(user_id.clone())
        }
    };

    Ok(ws.on_upgrade(move |socket| {
        run_channel(socket, state, meeting_id, user_id, host_lookup, profile)
    }))
}

/// Drive one push channel from upgrade to disconnect.
async fn run_channel(
    mut socket: WebSocket,
    state: Arc<AppState>,
    meeting_id: MeetingId,
    user_id: UserId,
    host_lookup: HostLookup,
    profile: ProfileSummary,
) {
    let (frame_tx, mut frame_rx) = mpsc::channel::<EventFrame>(state.config.channel_capacity);

    let ack = match state
        .supervisor
        .join(
            meeting_id.clone(),
            user_id.clone(),
            frame_tx,
            host_lookup,
            profile,
        )
        .await
    {
        Ok(ack) => ack,
        Err(e) => {
            warn!(
                target: "sc.handlers.channel",
                meeting_id = %meeting_id,
                error = %e,
                "Join failed, closing channel"
            );
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let (mut ws_tx, mut ws_rx) = socket.split();
    let ping_interval = state.config.ping_interval;
    let liveness_timeout = state.config.liveness_timeout;

    // Writer: drains the frame channel and keeps the connection alive
    // with periodic pings. Ends when the registry drops our sender
    // (supersession, rejection, session teardown) or the socket dies.
    let mut send_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                frame = frame_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            let Ok(text) = serde_json::to_string(&frame) else {
                                continue;
                            };
                            if ws_tx.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            let _ = ws_tx.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }
                _ = ping.tick() => {
                    if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Reader: consumes pongs and close frames. Any inbound traffic counts
    // as liveness; a silent socket past the deadline is treated as dead.
    let channel_user = user_id.clone();
    let mut recv_task = tokio::spawn(async move {
        loop {
            match tokio::time::timeout(liveness_timeout, ws_rx.next()).await {
                Ok(Some(Ok(Message::Close(_)))) => break,
                Ok(Some(Ok(_))) => {}
                Ok(Some(Err(_)) | None) => break,
                Err(_) => {
                    warn!(
                        target: "sc.handlers.channel",
                        user_id = %channel_user,
                        "Liveness deadline missed, dropping channel"
                    );
                    break;
                }
            }
        }
    });

    // Whichever side ends first takes the other down with it.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // The single disconnect signal for this connection, whatever the
    // close path was. The stamp keeps it from unwinding a successor.
    state
        .supervisor
        .disconnect(&meeting_id, &user_id, ack.stamp)
        .await;

    debug!(
        target: "sc.handlers.channel",
        meeting_id = %meeting_id,
        user_id = %user_id,
        "Channel closed"
    );
}
