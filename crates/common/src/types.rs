//! Identifier newtypes for Parley components.
//!
//! Meeting, user and room identifiers originate in external systems (the
//! meeting directory, the authentication provider, clients naming breakout
//! rooms), so they are opaque strings rather than UUIDs. Wrapping them in
//! newtypes keeps the signatures honest: a `UserId` cannot be passed where
//! a `MeetingId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a meeting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeetingId(String);

impl MeetingId {
    /// Wrap an externally-issued meeting identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MeetingId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Unique identifier for a user, as issued by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an externally-issued user identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Name of a room within a meeting.
///
/// Every meeting owns at least the [`RoomId::main`] room; breakout rooms
/// are client-named.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

/// Name of the room every meeting starts with.
pub const MAIN_ROOM: &str = "main";

impl RoomId {
    /// Wrap a client-supplied room name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The default room every approved participant starts in.
    #[must_use]
    pub fn main() -> Self {
        Self(MAIN_ROOM.to_string())
    }

    /// Whether this is the default room.
    #[must_use]
    pub fn is_main(&self) -> bool {
        self.0 == MAIN_ROOM
    }

    /// Borrow the raw room name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_transparently() {
        let meeting = MeetingId::new("mtg-123");
        let json = serde_json::to_string(&meeting).unwrap();
        assert_eq!(json, "\"mtg-123\"");

        let back: MeetingId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meeting);
    }

    #[test]
    fn test_main_room() {
        assert!(RoomId::main().is_main());
        assert!(!RoomId::new("room-42").is_main());
        assert_eq!(RoomId::main().as_str(), MAIN_ROOM);
    }

    #[test]
    fn test_display_matches_raw_value() {
        assert_eq!(UserId::new("u-1").to_string(), "u-1");
        assert_eq!(MeetingId::from("m-1").as_str(), "m-1");
    }
}
