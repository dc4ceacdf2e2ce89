//! Collaborator clients: meeting directory and user directory.
//!
//! The signaling core consults two external stores, both best-effort:
//!
//! - the **meeting directory** answers "who created this meeting" for
//!   host resolution;
//! - the **user directory** answers "display fields for this user" to
//!   enrich approval requests.
//!
//! Both are behind traits so tests substitute in-memory fakes. Failures
//! become [`DirectoryError`]s that callers turn into the documented
//! fallbacks (first-joiner-is-host, raw-id profile); they are never
//! surfaced to end users as hard failures.

use crate::errors::ScError;
use crate::protocol::ProfileSummary;
use async_trait::async_trait;
use common::types::{MeetingId, UserId};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Why a directory lookup failed.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The request never completed (connect error, timeout, ...).
    #[error("directory request failed: {0}")]
    Request(String),

    /// The directory answered with a non-success status.
    #[error("directory returned status {0}")]
    Status(u16),

    /// The response body did not match the expected shape.
    #[error("directory response malformed: {0}")]
    Malformed(String),
}

impl From<DirectoryError> for ScError {
    fn from(err: DirectoryError) -> Self {
        ScError::CollaboratorUnavailable(err.to_string())
    }
}

/// Meeting-metadata store: "get creator id by meeting id".
#[async_trait]
pub trait MeetingDirectory: Send + Sync {
    async fn creator_of(&self, meeting_id: &MeetingId) -> Result<UserId, DirectoryError>;
}

/// User-profile store: "get display fields by user id".
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn profile_of(&self, user_id: &UserId) -> Result<ProfileSummary, DirectoryError>;
}

/// Build the shared HTTP client for directory lookups.
pub fn directory_client(timeout: Duration) -> Result<reqwest::Client, DirectoryError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DirectoryError::Request(e.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeetingRecord {
    creator_id: String,
}

/// HTTP-backed meeting directory.
///
/// `GET {base}/v1/meetings/{meeting_id}` → `{ "creatorId": ... }`.
pub struct HttpMeetingDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMeetingDirectory {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MeetingDirectory for HttpMeetingDirectory {
    async fn creator_of(&self, meeting_id: &MeetingId) -> Result<UserId, DirectoryError> {
        let url = format!("{}/v1/meetings/{}", self.base_url, meeting_id);
        debug!(target: "sc.directory", url = %url, "Looking up meeting creator");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DirectoryError::Status(response.status().as_u16()));
        }

        let record: MeetingRecord = response
            .json()
            .await
            .map_err(|e| DirectoryError::Malformed(e.to_string()))?;

        Ok(UserId::new(record.creator_id))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    display_name: Option<String>,
    avatar_url: Option<String>,
}

/// HTTP-backed user directory.
///
/// `GET {base}/v1/users/{user_id}` → `{ "displayName": ..., "avatarUrl": ... }`.
pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUserDirectory {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn profile_of(&self, user_id: &UserId) -> Result<ProfileSummary, DirectoryError> {
        let url = format!("{}/v1/users/{}", self.base_url, user_id);
        debug!(target: "sc.directory", url = %url, "Looking up user profile");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DirectoryError::Status(response.status().as_u16()));
        }

        let record: UserRecord = response
            .json()
            .await
            .map_err(|e| DirectoryError::Malformed(e.to_string()))?;

        Ok(ProfileSummary {
            user_id: user_id.clone(),
            display_name: record.display_name,
            avatar_url: record.avatar_url,
        })
    }
}
