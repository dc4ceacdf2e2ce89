//! Per-meeting ephemeral session state.
//!
//! `SessionState` is owned exclusively by that meeting's `SessionActor`;
//! nothing else mutates it. The mutators preserve two invariants at every
//! step:
//!
//! - `waiting ∩ participants = ∅`
//! - every participant belongs to exactly one room; waiting users belong
//!   to none
//!
//! There is no persistence. A session exists from the first connection
//! attempt until its membership drains, and is rebuilt from reconnections
//! after a restart.

use common::types::{MeetingId, RoomId, UserId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// What `remove_member` actually removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRemoval {
    /// The user was an approved participant.
    pub was_participant: bool,
    /// The user was in the waiting room.
    pub was_waiting: bool,
}

impl MemberRemoval {
    /// Whether the user was a member in any sense.
    #[must_use]
    pub fn was_member(&self) -> bool {
        self.was_participant || self.was_waiting
    }
}

/// Ephemeral state for one meeting.
#[derive(Debug)]
pub struct SessionState {
    meeting_id: MeetingId,
    /// Resolved host identity. Survives the host's disconnects; a session
    /// keeps its host for the process lifetime of the session.
    host: Option<UserId>,
    participants: BTreeSet<UserId>,
    waiting: BTreeSet<UserId>,
    rooms: BTreeMap<RoomId, BTreeSet<UserId>>,
    recording_allowed: BTreeSet<UserId>,
    chat_muted: BTreeSet<UserId>,
    chat_global_mute: bool,
}

impl SessionState {
    /// Create an empty session with the `main` room.
    #[must_use]
    pub fn new(meeting_id: MeetingId) -> Self {
        let mut rooms = BTreeMap::new();
        rooms.insert(RoomId::main(), BTreeSet::new());
        Self {
            meeting_id,
            host: None,
            participants: BTreeSet::new(),
            waiting: BTreeSet::new(),
            rooms,
            recording_allowed: BTreeSet::new(),
            chat_muted: BTreeSet::new(),
            chat_global_mute: false,
        }
    }

    /// The meeting this session belongs to.
    #[must_use]
    pub fn meeting_id(&self) -> &MeetingId {
        &self.meeting_id
    }

    /// The resolved host, if one has been established.
    #[must_use]
    pub fn host(&self) -> Option<&UserId> {
        self.host.as_ref()
    }

    /// Record the resolved host identity.
    pub fn set_host(&mut self, host: UserId) {
        self.host = Some(host);
    }

    /// Whether `user` is the session's host.
    #[must_use]
    pub fn is_host(&self, user: &UserId) -> bool {
        self.host.as_ref() == Some(user)
    }

    /// Whether `user` is an approved participant.
    #[must_use]
    pub fn is_participant(&self, user: &UserId) -> bool {
        self.participants.contains(user)
    }

    /// Whether `user` is awaiting approval.
    #[must_use]
    pub fn is_waiting(&self, user: &UserId) -> bool {
        self.waiting.contains(user)
    }

    /// Approved participants, in stable order.
    pub fn participants(&self) -> impl Iterator<Item = &UserId> {
        self.participants.iter()
    }

    /// Users awaiting approval, in stable order.
    pub fn waiting(&self) -> impl Iterator<Item = &UserId> {
        self.waiting.iter()
    }

    /// Whether the session has drained entirely (no participants, nobody
    /// waiting).
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.participants.is_empty() && self.waiting.is_empty()
    }

    /// Whether the participant set is empty.
    #[must_use]
    pub fn has_no_participants(&self) -> bool {
        self.participants.is_empty()
    }

    /// Admit `user` directly into the participant set and the `main` room
    /// (the host fast-path). Idempotent; returns whether the user was
    /// newly admitted.
    pub fn admit(&mut self, user: &UserId) -> bool {
        self.waiting.remove(user);
        let added = self.participants.insert(user.clone());
        if added {
            self.place_in_room(user, &RoomId::main());
        }
        added
    }

    /// Put `user` in the waiting room. A no-op for users who are already
    /// participants (rejoin) or already waiting. Returns whether the user
    /// was newly enqueued.
    pub fn enqueue_waiting(&mut self, user: &UserId) -> bool {
        if self.participants.contains(user) {
            return false;
        }
        self.waiting.insert(user.clone())
    }

    /// Move `user` from the waiting room into the participant set and the
    /// `main` room. Returns `false` if the user was not waiting.
    pub fn approve(&mut self, user: &UserId) -> bool {
        if !self.waiting.remove(user) {
            return false;
        }
        self.participants.insert(user.clone());
        self.place_in_room(user, &RoomId::main());
        true
    }

    /// Remove `user` from the waiting room only. Returns `false` if the
    /// user was not waiting.
    pub fn reject(&mut self, user: &UserId) -> bool {
        self.waiting.remove(user)
    }

    /// Create an empty room. Returns whether the room was newly created.
    pub fn create_room(&mut self, room: &RoomId) -> bool {
        if self.rooms.contains_key(room) {
            return false;
        }
        self.rooms.insert(room.clone(), BTreeSet::new());
        true
    }

    /// Move a participant into `room`, creating the room if needed.
    /// Returns `false` (and changes nothing) if `user` is not an approved
    /// participant — waiting users belong to no room.
    pub fn move_to_room(&mut self, user: &UserId, room: &RoomId) -> bool {
        if !self.participants.contains(user) {
            return false;
        }
        self.place_in_room(user, room);
        true
    }

    /// The room currently containing `user`, if any.
    #[must_use]
    pub fn room_of(&self, user: &UserId) -> Option<&RoomId> {
        self.rooms
            .iter()
            .find(|(_, members)| members.contains(user))
            .map(|(room, _)| room)
    }

    /// Room ids, `main` first, the rest in stable order.
    #[must_use]
    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids = vec![RoomId::main()];
        ids.extend(self.rooms.keys().filter(|r| !r.is_main()).cloned());
        ids
    }

    /// Grant or revoke recording permission for `user`.
    pub fn set_recording_allowed(&mut self, user: &UserId, allowed: bool) {
        if allowed {
            self.recording_allowed.insert(user.clone());
        } else {
            self.recording_allowed.remove(user);
        }
    }

    /// Whether `user` holds an explicit recording grant (hosts and admins
    /// are allowed implicitly by the caller-side check).
    #[must_use]
    pub fn is_recording_allowed(&self, user: &UserId) -> bool {
        self.recording_allowed.contains(user)
    }

    /// Mute or unmute `user` individually for chat.
    pub fn set_chat_muted(&mut self, user: &UserId, muted: bool) {
        if muted {
            self.chat_muted.insert(user.clone());
        } else {
            self.chat_muted.remove(user);
        }
    }

    /// Set or clear the global chat mute.
    pub fn set_chat_global_mute(&mut self, muted: bool) {
        self.chat_global_mute = muted;
    }

    /// Whether the global chat mute is set.
    #[must_use]
    pub fn chat_global_mute(&self) -> bool {
        self.chat_global_mute
    }

    /// Whether `user` may post a chat message. Individually muted users
    /// may never post; under a global mute only the host and admins may.
    #[must_use]
    pub fn may_chat(&self, user: &UserId, is_admin: bool) -> bool {
        if self.chat_muted.contains(user) {
            return false;
        }
        if self.chat_global_mute {
            return is_admin || self.is_host(user);
        }
        true
    }

    /// Remove `user` from every structure: waiting room, participant set,
    /// room partition, permission and mute sets. The host designation is
    /// kept — the host can disconnect and return.
    pub fn remove_member(&mut self, user: &UserId) -> MemberRemoval {
        let was_waiting = self.waiting.remove(user);
        let was_participant = self.participants.remove(user);
        for members in self.rooms.values_mut() {
            members.remove(user);
        }
        self.recording_allowed.remove(user);
        self.chat_muted.remove(user);
        MemberRemoval {
            was_participant,
            was_waiting,
        }
    }

    /// A serializable copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            meeting_id: self.meeting_id.clone(),
            host: self.host.clone(),
            participants: self.participants.iter().cloned().collect(),
            waiting: self.waiting.iter().cloned().collect(),
            rooms: self
                .room_ids()
                .into_iter()
                .map(|room| {
                    let members = self
                        .rooms
                        .get(&room)
                        .map(|m| m.iter().cloned().collect())
                        .unwrap_or_default();
                    (room, members)
                })
                .collect(),
            recording_allowed: self.recording_allowed.iter().cloned().collect(),
            chat_muted: self.chat_muted.iter().cloned().collect(),
            chat_global_mute: self.chat_global_mute,
        }
    }

    /// Remove `user` from every room, then insert into `room` (creating
    /// it if absent). Keeps the exactly-one-room invariant.
    fn place_in_room(&mut self, user: &UserId, room: &RoomId) {
        for members in self.rooms.values_mut() {
            members.remove(user);
        }
        self.rooms
            .entry(room.clone())
            .or_default()
            .insert(user.clone());
    }
}

/// Read-only copy of a session's state, for handlers and tests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub meeting_id: MeetingId,
    pub host: Option<UserId>,
    pub participants: Vec<UserId>,
    pub waiting: Vec<UserId>,
    /// `(room, members)` pairs, `main` first.
    pub rooms: Vec<(RoomId, Vec<UserId>)>,
    pub recording_allowed: Vec<UserId>,
    pub chat_muted: Vec<UserId>,
    pub chat_global_mute: bool,
}

impl SessionSnapshot {
    /// Members of a room, if it exists.
    #[must_use]
    pub fn room_members(&self, room: &RoomId) -> Option<&[UserId]> {
        self.rooms
            .iter()
            .find(|(r, _)| r == room)
            .map(|(_, members)| members.as_slice())
    }

    /// Room ids in snapshot order (`main` first).
    #[must_use]
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|(r, _)| r.clone()).collect()
    }
}
