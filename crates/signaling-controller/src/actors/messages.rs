//! Message types for actor communication.
//!
//! All inter-actor communication uses strongly-typed message passing via
//! `tokio::sync::mpsc`. Request-reply patterns use `tokio::sync::oneshot`.
//! Everything a session actor needs from a collaborator is resolved
//! *before* the message is sent, so actors never suspend on external
//! lookups while holding a meeting's state.

use crate::errors::ScError;
use crate::protocol::{ActionRequest, EventFrame, ProfileSummary};
use crate::registry::ConnectionStamp;
use crate::session::SessionSnapshot;
use common::types::UserId;
use tokio::sync::{mpsc, oneshot};

/// Outcome of the meeting-directory creator lookup, performed by the
/// channel handler ahead of the join.
#[derive(Debug, Clone)]
pub enum HostLookup {
    /// The directory answered: this meeting was created by `UserId`.
    Creator(UserId),
    /// The directory was unreachable. The actor applies the fallback
    /// policy: with an empty participant set, the requester becomes host
    /// for the process lifetime of the session.
    Unavailable,
}

/// The authenticated identity behind an action request.
#[derive(Debug, Clone)]
pub struct Caller {
    /// Stable user id from the authentication provider.
    pub user_id: UserId,
    /// Whether the token carries the platform admin role.
    pub is_admin: bool,
}

/// Reply to a successful join.
#[derive(Debug, Clone, Copy)]
pub struct JoinAck {
    /// Stamp of the registered connection; the channel task hands it back
    /// on disconnect so stale closes can be told apart from live ones.
    pub stamp: ConnectionStamp,
    /// Whether the joiner was admitted as host.
    pub is_host: bool,
}

/// Messages sent to a `SessionActor`.
#[derive(Debug)]
pub enum SessionMessage {
    /// A push channel opened for `(meeting, user)`.
    Join {
        user_id: UserId,
        /// Outbound frame channel for the new connection.
        channel: mpsc::Sender<EventFrame>,
        /// Pre-resolved creator lookup.
        host_lookup: HostLookup,
        /// Pre-fetched profile summary for approval requests.
        profile: ProfileSummary,
        respond_to: oneshot::Sender<JoinAck>,
    },

    /// An action-endpoint request for this meeting.
    Action {
        caller: Caller,
        request: ActionRequest,
        respond_to: oneshot::Sender<Result<(), ScError>>,
    },

    /// A push channel closed. Carries the stamp of the registration the
    /// closing task belonged to; a stale stamp makes this a no-op.
    Disconnect {
        user_id: UserId,
        stamp: ConnectionStamp,
    },

    /// Read the current session state.
    GetState {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
}
