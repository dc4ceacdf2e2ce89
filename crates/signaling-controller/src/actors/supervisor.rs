//! `SessionSupervisor` - singleton that owns the session actors.
//!
//! The supervisor:
//! - Creates session actors lazily, on the first join for a meeting
//! - Hands out handles for action dispatch and state reads
//! - Reaps actors whose task has finished (session drained or panicked),
//!   so a finished session is replaced, never resurrected
//! - Owns the root `CancellationToken`; cancelling it propagates to every
//!   session actor for graceful shutdown
//!
//! Sessions for different meetings run independently; the supervisor only
//! brokers handle lookups and never awaits a session actor itself.

use crate::errors::ScError;
use crate::protocol::{ActionRequest, EventFrame, ProfileSummary};
use crate::registry::{ConnectionRegistry, ConnectionStamp};
use crate::session::SessionSnapshot;

use super::messages::{Caller, HostLookup, JoinAck};
use super::session::{SessionActor, SessionHandle};

use common::types::{MeetingId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Channel buffer size for the supervisor mailbox.
const SUPERVISOR_CHANNEL_BUFFER: usize = 512;

/// How often finished session actors are reaped.
const REAP_INTERVAL: Duration = Duration::from_secs(30);

/// How many times a join retries when it loses the race against a
/// draining session actor.
const JOIN_ATTEMPTS: usize = 3;

/// Messages sent to the `SessionSupervisor`.
#[derive(Debug)]
enum SupervisorMessage {
    /// Get the session for a meeting, creating it if absent or finished.
    EnsureSession {
        meeting_id: MeetingId,
        respond_to: oneshot::Sender<SessionHandle>,
    },

    /// Get the session for a meeting if it is alive.
    GetSession {
        meeting_id: MeetingId,
        respond_to: oneshot::Sender<Option<SessionHandle>>,
    },

    /// Current supervisor status (for readiness and debugging).
    GetStatus {
        respond_to: oneshot::Sender<SupervisorStatus>,
    },
}

/// Status of the supervisor.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorStatus {
    /// Live sessions.
    pub session_count: usize,
}

/// Handle to the `SessionSupervisor`.
#[derive(Clone)]
pub struct SessionSupervisorHandle {
    sender: mpsc::Sender<SupervisorMessage>,
    cancel_token: CancellationToken,
}

impl SessionSupervisorHandle {
    /// Spawn the supervisor and return a handle to it.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        let (sender, receiver) = mpsc::channel(SUPERVISOR_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = SessionSupervisor {
            receiver,
            cancel_token: cancel_token.clone(),
            registry,
            sessions: HashMap::new(),
        };

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Open a push channel into a meeting: ensure the session exists and
    /// run the join workflow. Retries if the session drains between the
    /// lookup and the join.
    pub async fn join(
        &self,
        meeting_id: MeetingId,
        user_id: UserId,
        channel: mpsc::Sender<EventFrame>,
        host_lookup: HostLookup,
        profile: ProfileSummary,
    ) -> Result<JoinAck, ScError> {
        let mut last_err = ScError::Internal("join not attempted".to_string());
        for _ in 0..JOIN_ATTEMPTS {
            let handle = self.ensure_session(meeting_id.clone()).await?;
            match handle
                .join(
                    user_id.clone(),
                    channel.clone(),
                    host_lookup.clone(),
                    profile.clone(),
                )
                .await
            {
                Ok(ack) => return Ok(ack),
                Err(err @ ScError::NotFound(_)) => {
                    // Lost the race against a draining session; try again
                    // with a fresh actor.
                    debug!(
                        target: "sc.actor.supervisor",
                        meeting_id = %meeting_id,
                        "Join raced a draining session, retrying"
                    );
                    last_err = err;
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err)
    }

    /// Dispatch an action to a meeting's session. Actions never create
    /// sessions; an unknown meeting is a 404.
    pub async fn dispatch(
        &self,
        meeting_id: &MeetingId,
        caller: Caller,
        request: ActionRequest,
    ) -> Result<(), ScError> {
        let handle = self
            .get_session(meeting_id)
            .await
            .ok_or_else(|| ScError::NotFound("meeting not found".to_string()))?;
        handle.dispatch(caller, request).await
    }

    /// Signal a channel close for `(meeting, user)`. A no-op if the
    /// session is already gone.
    pub async fn disconnect(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
        stamp: ConnectionStamp,
    ) {
        if let Some(handle) = self.get_session(meeting_id).await {
            handle.disconnect(user_id.clone(), stamp).await;
        }
    }

    /// Read a meeting's session state, if the session exists.
    pub async fn session_state(&self, meeting_id: &MeetingId) -> Option<SessionSnapshot> {
        let handle = self.get_session(meeting_id).await?;
        handle.state().await
    }

    /// Get the session for a meeting, creating it if needed.
    pub async fn ensure_session(&self, meeting_id: MeetingId) -> Result<SessionHandle, ScError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SupervisorMessage::EnsureSession {
                meeting_id,
                respond_to: tx,
            })
            .await
            .map_err(|_| ScError::Internal("supervisor unavailable".to_string()))?;

        rx.await
            .map_err(|_| ScError::Internal("supervisor unavailable".to_string()))
    }

    /// Get the session for a meeting if one is alive.
    pub async fn get_session(&self, meeting_id: &MeetingId) -> Option<SessionHandle> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SupervisorMessage::GetSession {
                meeting_id: meeting_id.clone(),
                respond_to: tx,
            })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    /// Current supervisor status.
    pub async fn status(&self) -> Result<SupervisorStatus, ScError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SupervisorMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|_| ScError::Internal("supervisor unavailable".to_string()))?;

        rx.await
            .map_err(|_| ScError::Internal("supervisor unavailable".to_string()))
    }

    /// Cancel the supervisor and every session actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the supervisor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get a child token tied to the supervisor's lifetime.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// Internal state for a managed session.
struct ManagedSession {
    handle: SessionHandle,
    task_handle: JoinHandle<()>,
}

/// The `SessionSupervisor` implementation.
struct SessionSupervisor {
    receiver: mpsc::Receiver<SupervisorMessage>,
    cancel_token: CancellationToken,
    registry: Arc<ConnectionRegistry>,
    sessions: HashMap<MeetingId, ManagedSession>,
}

impl SessionSupervisor {
    /// Run the supervisor message loop.
    #[instrument(skip_all, name = "sc.actor.supervisor")]
    async fn run(mut self) {
        info!(target: "sc.actor.supervisor", "Session supervisor started");

        let mut reap_ticker = tokio::time::interval(REAP_INTERVAL);
        reap_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: "sc.actor.supervisor", "Supervisor received cancellation signal");
                    self.graceful_shutdown().await;
                    break;
                }

                _ = reap_ticker.tick() => {
                    self.reap_finished().await;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!(target: "sc.actor.supervisor", "Supervisor mailbox closed, exiting");
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "sc.actor.supervisor",
            sessions_remaining = self.sessions.len(),
            "Session supervisor stopped"
        );
    }

    fn handle_message(&mut self, message: SupervisorMessage) {
        match message {
            SupervisorMessage::EnsureSession {
                meeting_id,
                respond_to,
            } => {
                let handle = self.ensure_session(meeting_id);
                let _ = respond_to.send(handle);
            }

            SupervisorMessage::GetSession {
                meeting_id,
                respond_to,
            } => {
                let handle = self.live_session(&meeting_id);
                let _ = respond_to.send(handle);
            }

            SupervisorMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(SupervisorStatus {
                    session_count: self.sessions.len(),
                });
            }
        }
    }

    /// Get or lazily create the session for a meeting. A finished actor
    /// is replaced with a fresh one.
    fn ensure_session(&mut self, meeting_id: MeetingId) -> SessionHandle {
        if let Some(handle) = self.live_session(&meeting_id) {
            return handle;
        }

        debug!(
            target: "sc.actor.supervisor",
            meeting_id = %meeting_id,
            "Creating session"
        );

        let session_token = self.cancel_token.child_token();
        let (handle, task_handle) = SessionActor::spawn(
            meeting_id.clone(),
            Arc::clone(&self.registry),
            session_token,
        );

        self.sessions.insert(
            meeting_id.clone(),
            ManagedSession {
                handle: handle.clone(),
                task_handle,
            },
        );

        info!(
            target: "sc.actor.supervisor",
            meeting_id = %meeting_id,
            total_sessions = self.sessions.len(),
            "Session created"
        );

        handle
    }

    /// The live handle for a meeting, dropping the entry if its actor
    /// has finished.
    fn live_session(&mut self, meeting_id: &MeetingId) -> Option<SessionHandle> {
        match self.sessions.get(meeting_id) {
            Some(managed) if !managed.task_handle.is_finished() => Some(managed.handle.clone()),
            Some(_) => {
                self.sessions.remove(meeting_id);
                None
            }
            None => None,
        }
    }

    /// Reap finished session actors, surfacing panics.
    async fn reap_finished(&mut self) {
        let finished: Vec<MeetingId> = self
            .sessions
            .iter()
            .filter(|(_, managed)| managed.task_handle.is_finished())
            .map(|(meeting_id, _)| meeting_id.clone())
            .collect();

        for meeting_id in finished {
            if let Some(managed) = self.sessions.remove(&meeting_id) {
                match managed.task_handle.await {
                    Ok(()) => {
                        debug!(
                            target: "sc.actor.supervisor",
                            meeting_id = %meeting_id,
                            "Session actor exited cleanly"
                        );
                    }
                    Err(join_error) if join_error.is_panic() => {
                        error!(
                            target: "sc.actor.supervisor",
                            meeting_id = %meeting_id,
                            error = ?join_error,
                            "Session actor panicked"
                        );
                        // Connections of the panicked session would stay
                        // registered forever otherwise.
                        self.registry.remove_meeting(&meeting_id);
                    }
                    Err(_) => {}
                }
            }
        }
    }

    /// Cancel every session actor and wait for them to finish.
    async fn graceful_shutdown(&mut self) {
        info!(
            target: "sc.actor.supervisor",
            sessions = self.sessions.len(),
            "Performing graceful shutdown"
        );

        for managed in self.sessions.values() {
            managed.handle.cancel();
        }

        for (meeting_id, managed) in self.sessions.drain() {
            match tokio::time::timeout(Duration::from_secs(5), managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "sc.actor.supervisor",
                        meeting_id = %meeting_id,
                        "Session completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "sc.actor.supervisor",
                        meeting_id = %meeting_id,
                        error = ?e,
                        "Session task panicked during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "sc.actor.supervisor",
                        meeting_id = %meeting_id,
                        "Session shutdown timed out"
                    );
                }
            }
        }

        info!(target: "sc.actor.supervisor", "Graceful shutdown complete");
    }
}
