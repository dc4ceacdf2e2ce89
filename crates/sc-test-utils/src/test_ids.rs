//! Fixed test IDs for deterministic tests.
//!
//! All test IDs are fixed strings so test results are reproducible and
//! failures are greppable.

use common::types::{MeetingId, RoomId, UserId};

// Meetings
pub const TEST_MEETING_STANDUP: &str = "mtg-standup";
pub const TEST_MEETING_RETRO: &str = "mtg-retro";

// Users
pub const TEST_USER_HANA: &str = "user-hana";
pub const TEST_USER_ALICE: &str = "user-alice";
pub const TEST_USER_BOB: &str = "user-bob";
pub const TEST_USER_ADMIN: &str = "user-admin";

// Rooms
pub const TEST_ROOM_FORTY_TWO: &str = "room-42";

// Signing secret shared by test tokens and test verifiers
pub const TEST_AUTH_SECRET: &str = "test-signing-secret-do-not-use-in-production";

/// The standup meeting, hosted by Hana.
pub fn standup() -> MeetingId {
    MeetingId::new(TEST_MEETING_STANDUP)
}

/// The retro meeting.
pub fn retro() -> MeetingId {
    MeetingId::new(TEST_MEETING_RETRO)
}

/// Hana, the usual host.
pub fn hana() -> UserId {
    UserId::new(TEST_USER_HANA)
}

/// Alice, a regular participant.
pub fn alice() -> UserId {
    UserId::new(TEST_USER_ALICE)
}

/// Bob, another regular participant.
pub fn bob() -> UserId {
    UserId::new(TEST_USER_BOB)
}

/// The platform admin.
pub fn admin() -> UserId {
    UserId::new(TEST_USER_ADMIN)
}

/// A breakout room.
pub fn room_forty_two() -> RoomId {
    RoomId::new(TEST_ROOM_FORTY_TWO)
}
