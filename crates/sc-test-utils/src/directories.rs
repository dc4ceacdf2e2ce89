//! In-memory directory fakes.
//!
//! Stand-ins for the meeting-metadata and user-profile collaborators:
//! static maps for the happy paths, always-failing variants for the
//! degradation paths.

use async_trait::async_trait;
use common::types::{MeetingId, UserId};
use signaling_controller::directory::{DirectoryError, MeetingDirectory, UserDirectory};
use signaling_controller::protocol::ProfileSummary;
use std::collections::HashMap;

/// Meeting directory backed by a static creator map.
#[derive(Default)]
pub struct StaticMeetingDirectory {
    creators: HashMap<MeetingId, UserId>,
}

impl StaticMeetingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a meeting with its creator.
    pub fn with_creator(mut self, meeting_id: MeetingId, creator: UserId) -> Self {
        self.creators.insert(meeting_id, creator);
        self
    }
}

#[async_trait]
impl MeetingDirectory for StaticMeetingDirectory {
    async fn creator_of(&self, meeting_id: &MeetingId) -> Result<UserId, DirectoryError> {
        self.creators
            .get(meeting_id)
            .cloned()
            .ok_or(DirectoryError::Status(404))
    }
}

/// Meeting directory that is always down.
pub struct UnavailableMeetingDirectory;

#[async_trait]
impl MeetingDirectory for UnavailableMeetingDirectory {
    async fn creator_of(&self, _meeting_id: &MeetingId) -> Result<UserId, DirectoryError> {
        Err(DirectoryError::Request("connection refused".to_string()))
    }
}

/// User directory backed by a static profile map.
#[derive(Default)]
pub struct StaticUserDirectory {
    profiles: HashMap<UserId, ProfileSummary>,
}

impl StaticUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a display name for a user.
    pub fn with_display_name(mut self, user_id: UserId, display_name: &str) -> Self {
        self.profiles.insert(
            user_id.clone(),
            ProfileSummary {
                user_id,
                display_name: Some(display_name.to_string()),
                avatar_url: None,
            },
        );
        self
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn profile_of(&self, user_id: &UserId) -> Result<ProfileSummary, DirectoryError> {
        self.profiles
            .get(user_id)
            .cloned()
            .ok_or(DirectoryError::Status(404))
    }
}

/// User directory that is always down.
pub struct UnavailableUserDirectory;

#[async_trait]
impl UserDirectory for UnavailableUserDirectory {
    async fn profile_of(&self, _user_id: &UserId) -> Result<ProfileSummary, DirectoryError> {
        Err(DirectoryError::Request("connection refused".to_string()))
    }
}
