//! `SessionActor` - per-meeting actor that owns session state.
//!
//! Each `SessionActor`:
//! - Owns all ephemeral state for one meeting ([`SessionState`])
//! - Serializes every mutation and read for that meeting: the mailbox is
//!   the per-meeting lock, and message handling never awaits, so no
//!   operation can suspend mid-mutation
//! - Applies the join workflow (host fast-path vs. waiting room), routes
//!   directed and broadcast control messages, and unwinds members on
//!   disconnect
//! - Prunes connections whose channel turns out to be dead during a send,
//!   through the same path as an observed disconnect
//!
//! The actor exits once its membership drains (last participant leaves,
//! nobody waiting), or when the last approved participant leaves — in the
//! latter case any still-waiting connections are dropped so their clients
//! reconnect into a fresh session. Different meetings run on different
//! actors and never block each other.

use crate::errors::ScError;
use crate::observability::metrics as obs;
use crate::protocol::{
    decode_data, ActionKind, ActionRequest, ChatData, EventFrame, MessageRef, ProfileSummary,
    RecordingData, RoomData,
};
use crate::registry::{ConnectionRegistry, ConnectionStamp, DeadConnection, SendOutcome};
use crate::session::{SessionSnapshot, SessionState};

use super::messages::{Caller, HostLookup, JoinAck, SessionMessage};

use common::types::{MeetingId, UserId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Channel buffer size for the session mailbox.
const SESSION_CHANNEL_BUFFER: usize = 256;

/// Handle to a `SessionActor`.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionMessage>,
    cancel_token: CancellationToken,
    meeting_id: MeetingId,
}

impl SessionHandle {
    /// Get the meeting ID.
    #[must_use]
    pub fn meeting_id(&self) -> &MeetingId {
        &self.meeting_id
    }

    /// Register a new push channel with the session.
    ///
    /// `host_lookup` and `profile` are resolved by the caller beforehand;
    /// the actor itself never waits on collaborators.
    pub async fn join(
        &self,
        user_id: UserId,
        channel: mpsc::Sender<EventFrame>,
        host_lookup: HostLookup,
        profile: ProfileSummary,
    ) -> Result<JoinAck, ScError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(SessionMessage::Join {
                user_id,
                channel,
                host_lookup,
                profile,
                respond_to: tx,
            })
            .await
            .map_err(|_| ScError::NotFound("session closed".to_string()))?;

        rx.await
            .map_err(|_| ScError::NotFound("session closed".to_string()))
    }

    /// Dispatch an action request to the session.
    pub async fn dispatch(&self, caller: Caller, request: ActionRequest) -> Result<(), ScError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(SessionMessage::Action {
                caller,
                request,
                respond_to: tx,
            })
            .await
            .map_err(|_| ScError::NotFound("meeting not found".to_string()))?;

        rx.await
            .map_err(|_| ScError::NotFound("meeting not found".to_string()))?
    }

    /// Signal that a push channel closed. Safe to call more than once and
    /// for superseded connections; the stamp disambiguates.
    pub async fn disconnect(&self, user_id: UserId, stamp: ConnectionStamp) {
        let _ = self
            .sender
            .send(SessionMessage::Disconnect { user_id, stamp })
            .await;
    }

    /// Read the current session state. `None` once the session is gone.
    pub async fn state(&self) -> Option<SessionSnapshot> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(SessionMessage::GetState { respond_to: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Cancel the session actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The `SessionActor` implementation.
pub struct SessionActor {
    meeting_id: MeetingId,
    state: SessionState,
    registry: Arc<ConnectionRegistry>,
    receiver: mpsc::Receiver<SessionMessage>,
    cancel_token: CancellationToken,
    /// Set once any member has been admitted or enqueued; guards the
    /// drain check so a freshly created session is not reaped before its
    /// first join is processed.
    seen_member: bool,
    /// Set when the session should tear down after the current message.
    stopping: bool,
}

impl SessionActor {
    /// Spawn a new session actor for `meeting_id`.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        meeting_id: MeetingId,
        registry: Arc<ConnectionRegistry>,
        cancel_token: CancellationToken,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_BUFFER);

        let actor = Self {
            meeting_id: meeting_id.clone(),
            state: SessionState::new(meeting_id.clone()),
            registry,
            receiver,
            cancel_token: cancel_token.clone(),
            seen_member: false,
            stopping: false,
        };

        obs::session_created();
        let task_handle = tokio::spawn(actor.run());

        let handle = SessionHandle {
            sender,
            cancel_token,
            meeting_id,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "sc.actor.session", fields(meeting_id = %self.meeting_id))]
    async fn run(mut self) {
        info!(target: "sc.actor.session", "Session started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: "sc.actor.session", "Session received cancellation signal");
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.handle_message(message);
                            if self.stopping || (self.seen_member && self.state.is_drained()) {
                                break;
                            }
                        }
                        None => {
                            debug!(target: "sc.actor.session", "Session mailbox closed, exiting");
                            break;
                        }
                    }
                }
            }
        }

        // Teardown: drop every remaining connection for this meeting so
        // their channel tasks wind down, then disappear without trace.
        let dropped = self.registry.remove_meeting(&self.meeting_id);
        obs::session_removed();
        info!(
            target: "sc.actor.session",
            dropped_connections = dropped,
            "Session removed"
        );
    }

    /// Handle a single message. Never awaits: the mailbox is the
    /// per-meeting serialization point.
    fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Join {
                user_id,
                channel,
                host_lookup,
                profile,
                respond_to,
            } => {
                let ack = self.handle_join(&user_id, channel, &host_lookup, profile);
                let _ = respond_to.send(ack);
            }

            SessionMessage::Action {
                caller,
                request,
                respond_to,
            } => {
                let result = self.handle_action(&caller, &request);
                let _ = respond_to.send(result);
            }

            SessionMessage::Disconnect { user_id, stamp } => {
                self.handle_disconnect(&user_id, stamp);
            }

            SessionMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.state.snapshot());
            }
        }
    }

    // ------------------------------------------------------------------
    // Join workflow
    // ------------------------------------------------------------------

    fn handle_join(
        &mut self,
        user_id: &UserId,
        channel: mpsc::Sender<EventFrame>,
        host_lookup: &HostLookup,
        profile: ProfileSummary,
    ) -> JoinAck {
        let stamp = self.registry.register(&self.meeting_id, user_id, channel);
        let is_host = self.resolve_host(user_id, host_lookup);
        self.seen_member = true;

        let mut dead = Vec::new();

        if is_host {
            self.state.admit(user_id);
            dead.extend(self.send_connected(user_id));

            let frame = EventFrame::HostConnected {
                user_id: user_id.clone(),
            };
            let state = &self.state;
            let filter = |u: &UserId| u != user_id && state.is_participant(u);
            dead.extend(
                self.registry
                    .broadcast(&self.meeting_id, &frame, Some(&filter)),
            );

            info!(
                target: "sc.actor.session",
                user_id = %user_id,
                participants = self.state.participants().count(),
                "Host connected"
            );
        } else if self.state.is_participant(user_id) {
            // Rejoin of an approved participant: membership is untouched,
            // only the connection was re-registered. Re-send the snapshot
            // so the client can re-sync.
            dead.extend(self.send_connected(user_id));
            debug!(target: "sc.actor.session", user_id = %user_id, "Participant reconnected");
        } else {
            self.state.enqueue_waiting(user_id);
            dead.extend(self.directed(user_id, EventFrame::WaitingApproval));

            if let Some(host) = self.state.host().cloned() {
                let frame = EventFrame::ApprovalRequest {
                    user_id: user_id.clone(),
                    profile,
                };
                match self.registry.send(&self.meeting_id, &host, frame) {
                    SendOutcome::ChannelClosed(host_stamp) => dead.push(DeadConnection {
                        user_id: host,
                        stamp: host_stamp,
                    }),
                    SendOutcome::NotConnected | SendOutcome::Delivered => {}
                }
            }

            info!(
                target: "sc.actor.session",
                user_id = %user_id,
                waiting = self.state.waiting().count(),
                "Participant waiting for approval"
            );
        }

        self.prune_dead(dead);
        JoinAck { stamp, is_host }
    }

    /// Apply the host policy to a pre-resolved creator lookup.
    ///
    /// On a successful lookup the creator is the host, full stop. On a
    /// failed lookup the first user into an empty session becomes host
    /// for the process lifetime of the session — a deliberate resilience
    /// behavior that doubles as a host-impersonation path; it is logged
    /// loudly so integrators can alert on it.
    fn resolve_host(&mut self, user_id: &UserId, lookup: &HostLookup) -> bool {
        match lookup {
            HostLookup::Creator(creator) => {
                self.state.set_host(creator.clone());
                creator == user_id
            }
            HostLookup::Unavailable => {
                if self.state.has_no_participants() {
                    warn!(
                        target: "sc.host_resolver",
                        meeting_id = %self.meeting_id,
                        user_id = %user_id,
                        fallback = true,
                        "Meeting directory unavailable, first joiner becomes host"
                    );
                    obs::host_fallback();
                    self.state.set_host(user_id.clone());
                    true
                } else {
                    false
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Action routing
    // ------------------------------------------------------------------

    fn handle_action(&mut self, caller: &Caller, request: &ActionRequest) -> Result<(), ScError> {
        obs::action_dispatched(&request.action);

        match request.kind() {
            ActionKind::Offer | ActionKind::Answer | ActionKind::IceCandidate => {
                self.relay_negotiation(caller, request)
            }
            ActionKind::ApproveParticipant => self.approve_participant(caller, request),
            ActionKind::RejectParticipant => self.reject_participant(caller, request),
            ActionKind::CreateRoom => self.create_room(request),
            ActionKind::MoveToRoom => self.move_to_room(request),
            ActionKind::SetRecordingPermission => self.set_recording_permission(caller, request),
            ActionKind::ChatMessage => self.chat_message(caller, request),
            ActionKind::ChatMuteUser => self.chat_mute_user(caller, request, true),
            ActionKind::ChatUnmuteUser => self.chat_mute_user(caller, request, false),
            ActionKind::ChatMuteAll => self.chat_mute_all(caller, true),
            ActionKind::ChatUnmuteAll => self.chat_mute_all(caller, false),
            ActionKind::ChatDeleteMessage => self.chat_delete_message(request),
            ActionKind::Unknown => Err(ScError::InvalidAction(request.action.clone())),
        }
    }

    /// Forward an opaque negotiation payload to the target, tagged with
    /// the sender id. The core never inspects the payload.
    fn relay_negotiation(&mut self, caller: &Caller, request: &ActionRequest) -> Result<(), ScError> {
        let target = require_target(request)?;
        let payload = request.data.clone().unwrap_or(serde_json::Value::Null);
        let from = caller.user_id.clone();

        let frame = match request.kind() {
            ActionKind::Offer => EventFrame::Offer { from, payload },
            ActionKind::Answer => EventFrame::Answer { from, payload },
            _ => EventFrame::IceCandidate { from, payload },
        };

        match self.registry.send(&self.meeting_id, &target, frame) {
            SendOutcome::Delivered => Ok(()),
            SendOutcome::NotConnected => Err(ScError::NotConnected),
            SendOutcome::ChannelClosed(stamp) => {
                self.prune_dead(vec![DeadConnection {
                    user_id: target,
                    stamp,
                }]);
                Err(ScError::NotConnected)
            }
        }
    }

    fn approve_participant(
        &mut self,
        caller: &Caller,
        request: &ActionRequest,
    ) -> Result<(), ScError> {
        self.require_moderator(caller)?;
        let target = require_target(request)?;

        if !self.state.approve(&target) {
            return Err(ScError::BadRequest(
                "target is not awaiting approval".to_string(),
            ));
        }

        let mut dead = Vec::new();
        dead.extend(self.directed(&target, EventFrame::Approved));
        dead.extend(self.send_connected(&target));
        let frame = EventFrame::UserJoined {
            user_id: target.clone(),
        };
        dead.extend(self.registry.broadcast(&self.meeting_id, &frame, None));
        self.prune_dead(dead);

        info!(
            target: "sc.actor.session",
            user_id = %target,
            participants = self.state.participants().count(),
            "Participant approved"
        );
        Ok(())
    }

    fn reject_participant(
        &mut self,
        caller: &Caller,
        request: &ActionRequest,
    ) -> Result<(), ScError> {
        self.require_moderator(caller)?;
        let target = require_target(request)?;

        if !self.state.reject(&target) {
            return Err(ScError::BadRequest(
                "target is not awaiting approval".to_string(),
            ));
        }

        // The rejected frame lands in the outbound buffer before the
        // entry is dropped; the writer task drains it, then the channel
        // ends and the socket closes. Waiting → Unconnected.
        let _ = self.directed(&target, EventFrame::Rejected);
        self.registry.unregister(&self.meeting_id, &target);

        if self.seen_member && self.state.is_drained() {
            self.stopping = true;
        }

        info!(target: "sc.actor.session", user_id = %target, "Participant rejected");
        Ok(())
    }

    fn create_room(&mut self, request: &ActionRequest) -> Result<(), ScError> {
        let data: RoomData = decode_data(&request.data)?;
        let room = data
            .room_id
            .ok_or_else(|| ScError::BadRequest("missing roomId".to_string()))?;

        if self.state.create_room(&room) {
            let frame = EventFrame::RoomCreated { room_id: room };
            let dead = self.registry.broadcast(&self.meeting_id, &frame, None);
            self.prune_dead(dead);
        }
        Ok(())
    }

    fn move_to_room(&mut self, request: &ActionRequest) -> Result<(), ScError> {
        let target = require_target(request)?;
        let data: RoomData = decode_data(&request.data)?;
        let room = data
            .room_id
            .ok_or_else(|| ScError::BadRequest("missing roomId".to_string()))?;

        if !self.state.move_to_room(&target, &room) {
            // Waiting users belong to no room; only approved participants
            // can be moved.
            return Err(ScError::NotFound("target not in meeting".to_string()));
        }

        let mut dead = Vec::new();
        dead.extend(self.directed(
            &target,
            EventFrame::RoomChanged {
                room_id: room.clone(),
            },
        ));
        let frame = EventFrame::ParticipantRoomChanged {
            user_id: target.clone(),
            room_id: room,
        };
        dead.extend(self.registry.broadcast(&self.meeting_id, &frame, None));
        self.prune_dead(dead);
        Ok(())
    }

    fn set_recording_permission(
        &mut self,
        caller: &Caller,
        request: &ActionRequest,
    ) -> Result<(), ScError> {
        self.require_moderator(caller)?;
        let target = require_target(request)?;
        let data: RecordingData = decode_data(&request.data)?;
        let allowed = data
            .allowed
            .ok_or_else(|| ScError::BadRequest("missing allowed".to_string()))?;

        self.state.set_recording_allowed(&target, allowed);
        let dead = self
            .directed(&target, EventFrame::RecordingPermission { allowed })
            .into_iter()
            .collect();
        self.prune_dead(dead);
        Ok(())
    }

    fn chat_message(&mut self, caller: &Caller, request: &ActionRequest) -> Result<(), ScError> {
        if !self.state.may_chat(&caller.user_id, caller.is_admin) {
            return Err(ScError::Forbidden("chat muted".to_string()));
        }

        let data: ChatData = decode_data(&request.data)?;
        let content = data
            .content
            .ok_or_else(|| ScError::BadRequest("missing content".to_string()))?;

        // Chat is meeting-wide regardless of room partition.
        let frame = EventFrame::ChatMessage {
            from: caller.user_id.clone(),
            content,
            message_id: data.message_id,
        };
        let dead = self.registry.broadcast(&self.meeting_id, &frame, None);
        self.prune_dead(dead);
        Ok(())
    }

    fn chat_mute_user(
        &mut self,
        caller: &Caller,
        request: &ActionRequest,
        muted: bool,
    ) -> Result<(), ScError> {
        self.require_moderator(caller)?;
        let target = require_target(request)?;

        self.state.set_chat_muted(&target, muted);
        let frame = if muted {
            EventFrame::ChatMuted
        } else {
            EventFrame::ChatUnmuted
        };
        let dead = self.directed(&target, frame).into_iter().collect();
        self.prune_dead(dead);
        Ok(())
    }

    fn chat_mute_all(&mut self, caller: &Caller, muted: bool) -> Result<(), ScError> {
        self.require_moderator(caller)?;
        self.state.set_chat_global_mute(muted);

        let frame = if muted {
            EventFrame::ChatGlobalMuted
        } else {
            EventFrame::ChatGlobalUnmuted
        };
        let dead = self.registry.broadcast(&self.meeting_id, &frame, None);
        self.prune_dead(dead);
        Ok(())
    }

    fn chat_delete_message(&mut self, request: &ActionRequest) -> Result<(), ScError> {
        let data: MessageRef = decode_data(&request.data)?;
        let message_id = data
            .message_id
            .ok_or_else(|| ScError::BadRequest("missing messageId".to_string()))?;

        // No server-side message store; clients drop the message by id.
        let frame = EventFrame::ChatMessageDeleted { message_id };
        let dead = self.registry.broadcast(&self.meeting_id, &frame, None);
        self.prune_dead(dead);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Disconnect handling
    // ------------------------------------------------------------------

    fn handle_disconnect(&mut self, user_id: &UserId, stamp: ConnectionStamp) {
        let owned = self
            .registry
            .unregister_if_current(&self.meeting_id, user_id, stamp);

        if !owned && self.registry.is_connected(&self.meeting_id, user_id) {
            // A superseding connection is live; this close belongs to the
            // replaced one.
            debug!(
                target: "sc.actor.session",
                user_id = %user_id,
                "Ignoring disconnect from superseded connection"
            );
            return;
        }

        let dead = self.unwind_member(user_id);
        self.prune_dead(dead);
    }

    /// Remove a member from every session structure and notify the rest.
    /// Returns any connections found dead while notifying.
    fn unwind_member(&mut self, user_id: &UserId) -> Vec<DeadConnection> {
        let removal = self.state.remove_member(user_id);
        if !removal.was_member() {
            return Vec::new();
        }

        if removal.was_participant {
            if self.state.has_no_participants() {
                // Last participant gone: the whole session goes with it.
                self.stopping = true;
                info!(
                    target: "sc.actor.session",
                    user_id = %user_id,
                    "Last participant left, tearing session down"
                );
                return Vec::new();
            }

            info!(
                target: "sc.actor.session",
                user_id = %user_id,
                remaining = self.state.participants().count(),
                "Participant left"
            );
            let frame = EventFrame::UserLeft {
                user_id: user_id.clone(),
            };
            let state = &self.state;
            let filter = |u: &UserId| state.is_participant(u);
            return self
                .registry
                .broadcast(&self.meeting_id, &frame, Some(&filter));
        }

        debug!(target: "sc.actor.session", user_id = %user_id, "Waiting user left");
        if self.state.is_drained() {
            self.stopping = true;
        }
        Vec::new()
    }

    /// Unwind connections whose channel was observed dead during a send,
    /// cascading until no dead channel remains. This is the explicit
    /// pruning that replaces silent fan-out failure swallowing.
    fn prune_dead(&mut self, mut dead: Vec<DeadConnection>) {
        while let Some(connection) = dead.pop() {
            if !self.registry.unregister_if_current(
                &self.meeting_id,
                &connection.user_id,
                connection.stamp,
            ) {
                continue;
            }

            obs::connection_pruned();
            warn!(
                target: "sc.actor.session",
                user_id = %connection.user_id,
                "Pruned dead connection"
            );
            dead.extend(self.unwind_member(&connection.user_id));
        }
    }

    // ------------------------------------------------------------------
    // Send helpers
    // ------------------------------------------------------------------

    /// Directed `connected` snapshot. The pending-approval list is only
    /// populated for the host.
    fn send_connected(&self, user_id: &UserId) -> Option<DeadConnection> {
        let is_host = self.state.is_host(user_id);
        let frame = EventFrame::Connected {
            is_host,
            participants: self.state.participants().cloned().collect(),
            pending_approvals: if is_host {
                self.state.waiting().cloned().collect()
            } else {
                Vec::new()
            },
            rooms: self.state.room_ids(),
        };
        self.directed(user_id, frame)
    }

    /// Directed best-effort send: `NotConnected` is fine (the recipient
    /// may have dropped), a closed channel is reported for pruning.
    fn directed(&self, user_id: &UserId, frame: EventFrame) -> Option<DeadConnection> {
        match self.registry.send(&self.meeting_id, user_id, frame) {
            SendOutcome::ChannelClosed(stamp) => Some(DeadConnection {
                user_id: user_id.clone(),
                stamp,
            }),
            SendOutcome::Delivered | SendOutcome::NotConnected => None,
        }
    }

    fn require_moderator(&self, caller: &Caller) -> Result<(), ScError> {
        if caller.is_admin || self.state.is_host(&caller.user_id) {
            Ok(())
        } else {
            Err(ScError::Forbidden("not authorized".to_string()))
        }
    }
}

fn require_target(request: &ActionRequest) -> Result<UserId, ScError> {
    request
        .target_user_id
        .clone()
        .ok_or_else(|| ScError::BadRequest("missing targetUserId".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use common::types::RoomId;

    fn spawn_session(meeting: &str) -> (SessionHandle, Arc<ConnectionRegistry>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let (handle, _task) = SessionActor::spawn(
            MeetingId::new(meeting),
            Arc::clone(&registry),
            CancellationToken::new(),
        );
        (handle, registry)
    }

    async fn join_host(
        handle: &SessionHandle,
        user: &str,
    ) -> (JoinAck, mpsc::Receiver<EventFrame>) {
        let (tx, rx) = mpsc::channel(16);
        let ack = handle
            .join(
                UserId::new(user),
                tx,
                HostLookup::Creator(UserId::new(user)),
                ProfileSummary::bare(UserId::new(user)),
            )
            .await
            .unwrap();
        (ack, rx)
    }

    async fn join_guest(
        handle: &SessionHandle,
        user: &str,
        creator: &str,
    ) -> (JoinAck, mpsc::Receiver<EventFrame>) {
        let (tx, rx) = mpsc::channel(16);
        let ack = handle
            .join(
                UserId::new(user),
                tx,
                HostLookup::Creator(UserId::new(creator)),
                ProfileSummary::bare(UserId::new(user)),
            )
            .await
            .unwrap();
        (ack, rx)
    }

    async fn state_of(handle: &SessionHandle) -> SessionSnapshot {
        handle.state().await.unwrap()
    }

    #[tokio::test]
    async fn test_host_join_fast_path() {
        let (handle, _registry) = spawn_session("m-1");
        let (ack, mut rx) = join_host(&handle, "host").await;
        assert!(ack.is_host);

        match rx.recv().await.unwrap() {
            EventFrame::Connected {
                is_host,
                participants,
                pending_approvals,
                rooms,
            } => {
                assert!(is_host);
                assert_eq!(participants, vec![UserId::new("host")]);
                assert!(pending_approvals.is_empty());
                assert_eq!(rooms, vec![RoomId::main()]);
            }
            other => panic!("expected connected frame, got {other:?}"),
        }

        let snapshot = state_of(&handle).await;
        assert_eq!(snapshot.participants, vec![UserId::new("host")]);
        assert_eq!(
            snapshot.room_members(&RoomId::main()).unwrap(),
            &[UserId::new("host")]
        );

        handle.cancel();
    }

    #[tokio::test]
    async fn test_guest_join_goes_to_waiting_and_notifies_host() {
        let (handle, _registry) = spawn_session("m-1");
        let (_ack, mut host_rx) = join_host(&handle, "host").await;
        let _ = host_rx.recv().await; // connected

        let (ack, mut guest_rx) = join_guest(&handle, "guest", "host").await;
        assert!(!ack.is_host);

        assert_eq!(guest_rx.recv().await.unwrap(), EventFrame::WaitingApproval);
        match host_rx.recv().await.unwrap() {
            EventFrame::ApprovalRequest { user_id, profile } => {
                assert_eq!(user_id, UserId::new("guest"));
                assert_eq!(profile.user_id, UserId::new("guest"));
            }
            other => panic!("expected approval request, got {other:?}"),
        }

        let snapshot = state_of(&handle).await;
        assert_eq!(snapshot.waiting, vec![UserId::new("guest")]);
        assert!(!snapshot.participants.contains(&UserId::new("guest")));

        handle.cancel();
    }

    #[tokio::test]
    async fn test_join_is_idempotent_for_membership() {
        let (handle, _registry) = spawn_session("m-1");
        let (_ack, _rx1) = join_host(&handle, "host").await;
        let before = state_of(&handle).await;

        // Second join for the same identity: connection superseded,
        // membership untouched.
        let (_ack2, mut rx2) = join_host(&handle, "host").await;
        let after = state_of(&handle).await;

        assert_eq!(before.participants, after.participants);
        assert_eq!(before.waiting, after.waiting);
        assert!(matches!(
            rx2.recv().await.unwrap(),
            EventFrame::Connected { .. }
        ));

        handle.cancel();
    }

    #[tokio::test]
    async fn test_host_fallback_when_directory_unavailable() {
        let (handle, _registry) = spawn_session("m-1");

        let (tx, mut rx) = mpsc::channel(16);
        let ack = handle
            .join(
                UserId::new("first"),
                tx,
                HostLookup::Unavailable,
                ProfileSummary::bare(UserId::new("first")),
            )
            .await
            .unwrap();

        // Empty session + unavailable directory: first joiner is host.
        assert!(ack.is_host);
        assert!(matches!(
            rx.recv().await.unwrap(),
            EventFrame::Connected { is_host: true, .. }
        ));

        // Second joiner under the same failure is not host.
        let (tx2, mut rx2) = mpsc::channel(16);
        let ack2 = handle
            .join(
                UserId::new("second"),
                tx2,
                HostLookup::Unavailable,
                ProfileSummary::bare(UserId::new("second")),
            )
            .await
            .unwrap();
        assert!(!ack2.is_host);
        assert_eq!(rx2.recv().await.unwrap(), EventFrame::WaitingApproval);

        handle.cancel();
    }

    #[tokio::test]
    async fn test_unknown_action_is_invalid() {
        let (handle, _registry) = spawn_session("m-1");
        let (_ack, _rx) = join_host(&handle, "host").await;

        let request = ActionRequest {
            action: "frobnicate".to_string(),
            meeting_id: Some(MeetingId::new("m-1")),
            target_user_id: None,
            data: None,
        };
        let caller = Caller {
            user_id: UserId::new("host"),
            is_admin: false,
        };
        let result = handle.dispatch(caller, request).await;
        assert!(matches!(result, Err(ScError::InvalidAction(_))));

        handle.cancel();
    }

    #[tokio::test]
    async fn test_offer_to_absent_target_is_not_connected() {
        let (handle, _registry) = spawn_session("m-1");
        let (_ack, _rx) = join_host(&handle, "host").await;

        let request = ActionRequest {
            action: "offer".to_string(),
            meeting_id: Some(MeetingId::new("m-1")),
            target_user_id: Some(UserId::new("nobody")),
            data: Some(serde_json::json!({"sdp": "v=0"})),
        };
        let caller = Caller {
            user_id: UserId::new("host"),
            is_admin: false,
        };
        let result = handle.dispatch(caller, request).await;
        assert!(matches!(result, Err(ScError::NotConnected)));

        handle.cancel();
    }

    #[tokio::test]
    async fn test_disconnect_with_stale_stamp_is_ignored() {
        let (handle, registry) = spawn_session("m-1");
        let (ack1, _rx1) = join_host(&handle, "host").await;
        let (_ack2, _rx2) = join_host(&handle, "host").await;

        // The first connection's close arrives after supersession.
        handle.disconnect(UserId::new("host"), ack1.stamp).await;

        let snapshot = state_of(&handle).await;
        assert_eq!(snapshot.participants, vec![UserId::new("host")]);
        assert!(registry.is_connected(&MeetingId::new("m-1"), &UserId::new("host")));

        handle.cancel();
    }

    #[tokio::test]
    async fn test_last_disconnect_tears_session_down() {
        let (handle, registry) = spawn_session("m-1");
        let (ack, _rx) = join_host(&handle, "host").await;

        handle.disconnect(UserId::new("host"), ack.stamp).await;

        // The actor exits; any further read observes no session.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(handle.state().await.is_none());
        assert_eq!(registry.connection_count(), 0);
    }
}
