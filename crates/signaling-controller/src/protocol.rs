//! Wire protocol for the signaling core.
//!
//! Two surfaces share these types:
//!
//! - The **push channel** emits [`EventFrame`]s: a closed sum type, one
//!   variant per event `type` tag, JSON-encoded with kebab-case tags and
//!   camelCase payload fields.
//! - The **action endpoint** accepts an [`ActionRequest`] envelope
//!   (`{ action, meetingId, targetUserId?, data? }`) and answers with an
//!   [`ActionAck`] or an error body.
//!
//! Negotiation payloads (offer/answer/ice-candidate) are opaque: the core
//! relays them verbatim and never inspects their contents.

use crate::errors::ScError;
use common::types::{MeetingId, RoomId, UserId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Display fields for a user, fetched best-effort from the user directory.
///
/// When the directory is unavailable the summary degrades to just the raw
/// user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    /// Stable user id.
    pub user_id: UserId,

    /// Display name, if the directory knew one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Avatar URL, if the directory knew one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileSummary {
    /// The fallback summary: just the raw id.
    #[must_use]
    pub fn bare(user_id: UserId) -> Self {
        Self {
            user_id,
            display_name: None,
            avatar_url: None,
        }
    }
}

/// An event frame pushed to a client over its channel.
///
/// Frames are either *directed* (sent to exactly one connection) or
/// *broadcast* (sent to every connection of the meeting, optionally
/// filtered); which one applies is decided by the sender, not encoded in
/// the frame itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventFrame {
    /// Directed to a joiner whose membership is settled: the session
    /// snapshot. `pending_approvals` is populated only for the host.
    #[serde(rename_all = "camelCase")]
    Connected {
        is_host: bool,
        participants: Vec<UserId>,
        pending_approvals: Vec<UserId>,
        rooms: Vec<RoomId>,
    },

    /// Broadcast to approved participants when the host's channel opens.
    #[serde(rename_all = "camelCase")]
    HostConnected { user_id: UserId },

    /// Directed to a joiner placed in the waiting room.
    WaitingApproval,

    /// Directed to the host when someone enters the waiting room.
    #[serde(rename_all = "camelCase")]
    ApprovalRequest {
        user_id: UserId,
        profile: ProfileSummary,
    },

    /// Directed to a waiting user the host approved.
    Approved,

    /// Directed to a waiting user the host rejected.
    Rejected,

    /// Broadcast when a waiting user becomes a participant.
    #[serde(rename_all = "camelCase")]
    UserJoined { user_id: UserId },

    /// Broadcast to remaining participants when one leaves.
    #[serde(rename_all = "camelCase")]
    UserLeft { user_id: UserId },

    /// Directed relay of a peer-connection offer. Opaque payload.
    Offer {
        from: UserId,
        payload: serde_json::Value,
    },

    /// Directed relay of a peer-connection answer. Opaque payload.
    Answer {
        from: UserId,
        payload: serde_json::Value,
    },

    /// Directed relay of an ICE candidate. Opaque payload.
    IceCandidate {
        from: UserId,
        payload: serde_json::Value,
    },

    /// Broadcast when a breakout room is created.
    #[serde(rename_all = "camelCase")]
    RoomCreated { room_id: RoomId },

    /// Directed to a participant who was moved to another room.
    #[serde(rename_all = "camelCase")]
    RoomChanged { room_id: RoomId },

    /// Broadcast when any participant changes room.
    #[serde(rename_all = "camelCase")]
    ParticipantRoomChanged { user_id: UserId, room_id: RoomId },

    /// Directed to a participant whose recording permission changed.
    RecordingPermission { allowed: bool },

    /// Broadcast chat message. Chat is meeting-wide, not room-scoped.
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        from: UserId,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },

    /// Broadcast when a chat message is retracted. The core keeps no
    /// message store; clients drop the message by id.
    #[serde(rename_all = "camelCase")]
    ChatMessageDeleted { message_id: String },

    /// Broadcast when the host mutes chat for everyone.
    ChatGlobalMuted,

    /// Broadcast when the host lifts the global chat mute.
    ChatGlobalUnmuted,

    /// Directed to an individually chat-muted user.
    ChatMuted,

    /// Directed to an individually chat-unmuted user.
    ChatUnmuted,
}

/// The action tags accepted by the action endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Offer,
    Answer,
    IceCandidate,
    ApproveParticipant,
    RejectParticipant,
    CreateRoom,
    MoveToRoom,
    SetRecordingPermission,
    ChatMessage,
    ChatMuteUser,
    ChatUnmuteUser,
    ChatMuteAll,
    ChatUnmuteAll,
    ChatDeleteMessage,
    /// Anything else. Routed to an `InvalidAction` error, not a parse
    /// failure, so the taxonomy stays closed.
    Unknown,
}

impl ActionKind {
    /// Map an action tag to its kind. Unrecognized tags map to
    /// [`ActionKind::Unknown`].
    #[must_use]
    pub fn parse(tag: &str) -> Self {
        match tag {
            "offer" => Self::Offer,
            "answer" => Self::Answer,
            "ice-candidate" => Self::IceCandidate,
            "approve-participant" => Self::ApproveParticipant,
            "reject-participant" => Self::RejectParticipant,
            "create-room" => Self::CreateRoom,
            "move-to-room" => Self::MoveToRoom,
            "set-recording-permission" => Self::SetRecordingPermission,
            "chat-message" => Self::ChatMessage,
            "chat-mute-user" => Self::ChatMuteUser,
            "chat-unmute-user" => Self::ChatUnmuteUser,
            "chat-mute-all" => Self::ChatMuteAll,
            "chat-unmute-all" => Self::ChatUnmuteAll,
            "chat-delete-message" => Self::ChatDeleteMessage,
            _ => Self::Unknown,
        }
    }
}

/// The action endpoint request envelope.
///
/// `meeting_id` is required for every action; most actions also require
/// `target_user_id`. Both are optional here so that absence surfaces as a
/// 400 with a precise message rather than a deserializer error.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    /// Action tag, e.g. `"approve-participant"`.
    pub action: String,

    /// Meeting the action applies to.
    pub meeting_id: Option<MeetingId>,

    /// Target of the action, where applicable.
    pub target_user_id: Option<UserId>,

    /// Kind-specific payload.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ActionRequest {
    /// The parsed action kind.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        ActionKind::parse(&self.action)
    }
}

/// Kind-specific payload for `create-room` and `move-to-room`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomData {
    pub room_id: Option<RoomId>,
}

/// Kind-specific payload for `set-recording-permission`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingData {
    pub allowed: Option<bool>,
}

/// Kind-specific payload for `chat-message`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatData {
    pub content: Option<String>,
    pub message_id: Option<String>,
}

/// Kind-specific payload for `chat-delete-message`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageRef {
    pub message_id: Option<String>,
}

/// Decode the `data` field of an [`ActionRequest`] into a kind-specific
/// payload. A missing `data` object decodes to the payload's default so
/// that per-field "missing X" errors stay precise.
pub fn decode_data<T>(data: &Option<serde_json::Value>) -> Result<T, ScError>
where
    T: Default + DeserializeOwned,
{
    match data {
        None => Ok(T::default()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| ScError::BadRequest(format!("malformed data: {e}"))),
    }
}

/// Successful action response: `{ "success": true }`.
#[derive(Debug, Clone, Serialize)]
pub struct ActionAck {
    pub success: bool,
}

impl ActionAck {
    /// The canonical success acknowledgement.
    #[must_use]
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_frame_wire_shape() {
        let frame = EventFrame::Connected {
            is_host: true,
            participants: vec![UserId::new("host-1")],
            pending_approvals: vec![],
            rooms: vec![RoomId::main()],
        };

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "connected");
        assert_eq!(json["isHost"], true);
        assert_eq!(json["participants"][0], "host-1");
        assert_eq!(json["pendingApprovals"], serde_json::json!([]));
        assert_eq!(json["rooms"][0], "main");
    }

    #[test]
    fn test_kebab_case_type_tags() {
        let cases = vec![
            (
                EventFrame::HostConnected {
                    user_id: UserId::new("h"),
                },
                "host-connected",
            ),
            (EventFrame::WaitingApproval, "waiting-approval"),
            (
                EventFrame::IceCandidate {
                    from: UserId::new("u"),
                    payload: serde_json::json!({"candidate": "..."}),
                },
                "ice-candidate",
            ),
            (
                EventFrame::ParticipantRoomChanged {
                    user_id: UserId::new("u"),
                    room_id: RoomId::new("room-42"),
                },
                "participant-room-changed",
            ),
            (
                EventFrame::ChatMessageDeleted {
                    message_id: "msg-1".to_string(),
                },
                "chat-message-deleted",
            ),
            (EventFrame::ChatGlobalMuted, "chat-global-muted"),
            (EventFrame::ChatUnmuted, "chat-unmuted"),
        ];

        for (frame, tag) in cases {
            let json = serde_json::to_value(&frame).unwrap();
            assert_eq!(json["type"], tag);
        }
    }

    #[test]
    fn test_frames_round_trip() {
        let frame = EventFrame::ChatMessage {
            from: UserId::new("u-1"),
            content: "hello".to_string(),
            message_id: Some("msg-9".to_string()),
        };

        let json = serde_json::to_string(&frame).unwrap();
        let back: EventFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_negotiation_payload_is_opaque() {
        let payload = serde_json::json!({"sdp": "v=0...", "nested": {"a": [1, 2]}});
        let frame = EventFrame::Offer {
            from: UserId::new("u-1"),
            payload: payload.clone(),
        };

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["payload"], payload);
    }

    #[test]
    fn test_action_kind_parse() {
        assert_eq!(ActionKind::parse("offer"), ActionKind::Offer);
        assert_eq!(
            ActionKind::parse("approve-participant"),
            ActionKind::ApproveParticipant
        );
        assert_eq!(
            ActionKind::parse("chat-delete-message"),
            ActionKind::ChatDeleteMessage
        );
        assert_eq!(ActionKind::parse("frobnicate"), ActionKind::Unknown);
        assert_eq!(ActionKind::parse(""), ActionKind::Unknown);
    }

    #[test]
    fn test_action_request_envelope() {
        let req: ActionRequest = serde_json::from_str(
            r#"{"action": "move-to-room", "meetingId": "m-1", "targetUserId": "u-2",
                "data": {"roomId": "room-42"}}"#,
        )
        .unwrap();

        assert_eq!(req.kind(), ActionKind::MoveToRoom);
        assert_eq!(req.meeting_id, Some(MeetingId::new("m-1")));
        assert_eq!(req.target_user_id, Some(UserId::new("u-2")));

        let data: RoomData = decode_data(&req.data).unwrap();
        assert_eq!(data.room_id, Some(RoomId::new("room-42")));
    }

    #[test]
    fn test_decode_data_defaults_when_absent() {
        let data: RecordingData = decode_data(&None).unwrap();
        assert_eq!(data.allowed, None);

        let data: ChatData = decode_data(&Some(serde_json::json!({}))).unwrap();
        assert_eq!(data.content, None);
    }

    #[test]
    fn test_profile_summary_fallback() {
        let profile = ProfileSummary::bare(UserId::new("u-7"));
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["userId"], "u-7");
        assert!(json.get("displayName").is_none());
    }
}
