//! Connection registry: `(meeting, user)` identity → live push channel.
//!
//! The registry owns every connection handle. A second registration for
//! the same identity supersedes the first (last writer wins): the old
//! sender is dropped, which closes the old writer task's channel and lets
//! its socket wind down through the normal disconnect path. Each
//! registration carries a monotonic [`ConnectionStamp`] so that a
//! disconnect signal from a superseded connection can be told apart from
//! one for the live connection.
//!
//! Sends never propagate transport failures to the caller: a missing
//! entry yields [`SendOutcome::NotConnected`], a full buffer drops the
//! frame for that recipient (slow consumer), and a closed channel is
//! reported back as dead so the caller can prune it through the same
//! path as an observed disconnect.

use crate::observability::metrics as obs;
use crate::protocol::EventFrame;
use common::types::{MeetingId, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Monotonic identifier for one registration of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionStamp(u64);

/// Result of a directed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The frame was handed to the recipient's channel (or dropped for a
    /// slow consumer, which is not a delivery failure).
    Delivered,
    /// No channel is registered for the identity.
    NotConnected,
    /// The channel is closed: the receiver is gone but the entry is still
    /// registered. The caller should prune it.
    ChannelClosed(ConnectionStamp),
}

/// A registered connection whose channel turned out to be closed during a
/// broadcast.
#[derive(Debug, Clone)]
pub struct DeadConnection {
    pub user_id: UserId,
    pub stamp: ConnectionStamp,
}

struct ConnectionEntry {
    sender: mpsc::Sender<EventFrame>,
    stamp: ConnectionStamp,
    connected_at: chrono::DateTime<chrono::Utc>,
}

/// Registry of live push channels, shared by handlers and session actors.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<(MeetingId, UserId), ConnectionEntry>>,
    next_stamp: AtomicU64,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_stamp: AtomicU64::new(1),
        }
    }

    /// Register a channel for `(meeting, user)`, superseding any existing
    /// entry. Never fails; returns the stamp of the new registration.
    pub fn register(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
        sender: mpsc::Sender<EventFrame>,
    ) -> ConnectionStamp {
        let stamp = ConnectionStamp(self.next_stamp.fetch_add(1, Ordering::Relaxed));
        let entry = ConnectionEntry {
            sender,
            stamp,
            connected_at: chrono::Utc::now(),
        };

        let replaced = self
            .write_lock()
            .insert((meeting_id.clone(), user_id.clone()), entry)
            .is_some();

        if replaced {
            debug!(
                target: "sc.registry",
                meeting_id = %meeting_id,
                user_id = %user_id,
                "Connection superseded by a newer registration"
            );
        } else {
            obs::connection_opened();
        }

        stamp
    }

    /// Remove the entry for `(meeting, user)` if present. Idempotent.
    pub fn unregister(&self, meeting_id: &MeetingId, user_id: &UserId) {
        if self
            .write_lock()
            .remove(&(meeting_id.clone(), user_id.clone()))
            .is_some()
        {
            obs::connection_closed();
        }
    }

    /// Remove the entry only if it still belongs to `stamp`. Returns
    /// whether an entry was removed. This is what makes disconnect
    /// handling idempotent: a close signal from a superseded connection
    /// carries a stale stamp and is a no-op.
    pub fn unregister_if_current(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
        stamp: ConnectionStamp,
    ) -> bool {
        let mut connections = self.write_lock();
        let key = (meeting_id.clone(), user_id.clone());
        match connections.get(&key) {
            Some(entry) if entry.stamp == stamp => {
                connections.remove(&key);
                obs::connection_closed();
                true
            }
            _ => false,
        }
    }

    /// Whether a channel is registered for the identity.
    #[must_use]
    pub fn is_connected(&self, meeting_id: &MeetingId, user_id: &UserId) -> bool {
        self.read_lock()
            .contains_key(&(meeting_id.clone(), user_id.clone()))
    }

    /// Seconds since the identity's current connection was registered.
    #[must_use]
    pub fn connected_since(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
    ) -> Option<chrono::DateTime<chrono::Utc>> {
        self.read_lock()
            .get(&(meeting_id.clone(), user_id.clone()))
            .map(|entry| entry.connected_at)
    }

    /// Total registered connections, across all meetings.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.read_lock().len()
    }

    /// Push a frame to one identity.
    pub fn send(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
        frame: EventFrame,
    ) -> SendOutcome {
        let target = {
            let connections = self.read_lock();
            connections
                .get(&(meeting_id.clone(), user_id.clone()))
                .map(|entry| (entry.sender.clone(), entry.stamp))
        };

        let Some((sender, stamp)) = target else {
            return SendOutcome::NotConnected;
        };

        self.push(meeting_id, user_id, &sender, stamp, frame)
    }

    /// Push a frame to every connection of the meeting, optionally
    /// filtered by user id. Individual failures never abort the fan-out;
    /// connections whose channel is closed are returned for pruning.
    pub fn broadcast(
        &self,
        meeting_id: &MeetingId,
        frame: &EventFrame,
        filter: Option<&dyn Fn(&UserId) -> bool>,
    ) -> Vec<DeadConnection> {
        let targets: Vec<(UserId, mpsc::Sender<EventFrame>, ConnectionStamp)> = {
            let connections = self.read_lock();
            connections
                .iter()
                .filter(|((meeting, user), _)| {
                    meeting == meeting_id && filter.map_or(true, |keep| keep(user))
                })
                .map(|((_, user), entry)| (user.clone(), entry.sender.clone(), entry.stamp))
                .collect()
        };

        let mut dead = Vec::new();
        for (user_id, sender, stamp) in targets {
            if let SendOutcome::ChannelClosed(stamp) =
                self.push(meeting_id, &user_id, &sender, stamp, frame.clone())
            {
                dead.push(DeadConnection { user_id, stamp });
            }
        }
        dead
    }

    /// Drop every entry for the meeting. Closing the senders ends the
    /// writer tasks, which closes the sockets. Used on session teardown
    /// and server shutdown.
    pub fn remove_meeting(&self, meeting_id: &MeetingId) -> usize {
        let mut connections = self.write_lock();
        let before = connections.len();
        connections.retain(|(meeting, _), _| meeting != meeting_id);
        let removed = before - connections.len();
        for _ in 0..removed {
            obs::connection_closed();
        }
        removed
    }

    fn push(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
        sender: &mpsc::Sender<EventFrame>,
        stamp: ConnectionStamp,
        frame: EventFrame,
    ) -> SendOutcome {
        match sender.try_send(frame) {
            Ok(()) => {
                obs::frame_sent();
                SendOutcome::Delivered
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Slow consumer: the frame is stale by the time the buffer
                // drains, so drop it rather than stall the meeting.
                warn!(
                    target: "sc.registry",
                    meeting_id = %meeting_id,
                    user_id = %user_id,
                    "Outbound buffer full, dropping frame"
                );
                obs::frame_dropped();
                SendOutcome::Delivered
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(
                    target: "sc.registry",
                    meeting_id = %meeting_id,
                    user_id = %user_id,
                    "Send hit a closed channel"
                );
                obs::send_failure();
                SendOutcome::ChannelClosed(stamp)
            }
        }
    }

    fn read_lock(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<(MeetingId, UserId), ConnectionEntry>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<(MeetingId, UserId), ConnectionEntry>> {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn ids() -> (MeetingId, UserId) {
        (MeetingId::new("m-1"), UserId::new("u-1"))
    }

    fn frame() -> EventFrame {
        EventFrame::ChatGlobalMuted
    }

    #[tokio::test]
    async fn test_send_to_unregistered_identity_is_not_connected() {
        let registry = ConnectionRegistry::new();
        let (meeting, user) = ids();

        assert_eq!(
            registry.send(&meeting, &user, frame()),
            SendOutcome::NotConnected
        );
    }

    #[tokio::test]
    async fn test_register_and_send() {
        let registry = ConnectionRegistry::new();
        let (meeting, user) = ids();
        let (tx, mut rx) = mpsc::channel(8);

        registry.register(&meeting, &user, tx);
        assert!(registry.is_connected(&meeting, &user));

        assert_eq!(
            registry.send(&meeting, &user, frame()),
            SendOutcome::Delivered
        );
        assert_eq!(rx.recv().await, Some(EventFrame::ChatGlobalMuted));
    }

    #[tokio::test]
    async fn test_second_registration_supersedes_first() {
        let registry = ConnectionRegistry::new();
        let (meeting, user) = ids();

        let (tx1, mut rx1) = mpsc::channel(8);
        let stamp1 = registry.register(&meeting, &user, tx1);

        let (tx2, mut rx2) = mpsc::channel(8);
        let stamp2 = registry.register(&meeting, &user, tx2);
        assert_ne!(stamp1, stamp2);

        // The first sender was dropped by the registry: its channel ends.
        assert_eq!(rx1.recv().await, None);

        // Sends now reach the new channel.
        registry.send(&meeting, &user, frame());
        assert_eq!(rx2.recv().await, Some(EventFrame::ChatGlobalMuted));

        // A stale-stamp unregister is a no-op; the live one removes.
        assert!(!registry.unregister_if_current(&meeting, &user, stamp1));
        assert!(registry.is_connected(&meeting, &user));
        assert!(registry.unregister_if_current(&meeting, &user, stamp2));
        assert!(!registry.is_connected(&meeting, &user));
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (meeting, user) = ids();
        let (tx, _rx) = mpsc::channel(8);

        registry.register(&meeting, &user, tx);
        registry.unregister(&meeting, &user);
        registry.unregister(&meeting, &user);
        assert!(!registry.is_connected(&meeting, &user));
    }

    #[tokio::test]
    async fn test_send_on_closed_channel_reports_dead() {
        let registry = ConnectionRegistry::new();
        let (meeting, user) = ids();
        let (tx, rx) = mpsc::channel(8);

        let stamp = registry.register(&meeting, &user, tx);
        drop(rx);

        assert_eq!(
            registry.send(&meeting, &user, frame()),
            SendOutcome::ChannelClosed(stamp)
        );
    }

    #[tokio::test]
    async fn test_broadcast_reaches_meeting_and_skips_others() {
        let registry = ConnectionRegistry::new();
        let meeting = MeetingId::new("m-1");
        let other_meeting = MeetingId::new("m-2");

        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        let (tx_other, mut rx_other) = mpsc::channel(8);
        registry.register(&meeting, &UserId::new("a"), tx_a);
        registry.register(&meeting, &UserId::new("b"), tx_b);
        registry.register(&other_meeting, &UserId::new("c"), tx_other);

        let dead = registry.broadcast(&meeting, &frame(), None);
        assert!(dead.is_empty());

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
        assert!(rx_other.try_recv().is_err(), "other meetings stay silent");
    }

    #[tokio::test]
    async fn test_broadcast_predicate_filters_recipients() {
        let registry = ConnectionRegistry::new();
        let meeting = MeetingId::new("m-1");

        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        registry.register(&meeting, &UserId::new("a"), tx_a);
        registry.register(&meeting, &UserId::new("b"), tx_b);

        let keep = |user: &UserId| user.as_str() != "a";
        registry.broadcast(&meeting, &frame(), Some(&keep));

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_survives_dead_channels_and_reports_them() {
        let registry = ConnectionRegistry::new();
        let meeting = MeetingId::new("m-1");

        let (tx_live, mut rx_live) = mpsc::channel(8);
        let (tx_dead, rx_dead) = mpsc::channel(8);
        registry.register(&meeting, &UserId::new("live"), tx_live);
        let dead_stamp = registry.register(&meeting, &UserId::new("dead"), tx_dead);
        drop(rx_dead);

        let dead = registry.broadcast(&meeting, &frame(), None);
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].user_id, UserId::new("dead"));
        assert_eq!(dead[0].stamp, dead_stamp);

        // The live recipient still got the frame.
        assert!(rx_live.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_full_buffer_drops_frame_without_failing() {
        let registry = ConnectionRegistry::new();
        let (meeting, user) = ids();
        let (tx, mut rx) = mpsc::channel(1);

        registry.register(&meeting, &user, tx);
        assert_eq!(
            registry.send(&meeting, &user, frame()),
            SendOutcome::Delivered
        );
        // Buffer is full now; the next frame is dropped, not an error.
        assert_eq!(
            registry.send(&meeting, &user, frame()),
            SendOutcome::Delivered
        );

        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err(), "second frame was dropped");
    }

    #[tokio::test]
    async fn test_remove_meeting_drops_all_entries() {
        let registry = ConnectionRegistry::new();
        let meeting = MeetingId::new("m-1");
        let other = MeetingId::new("m-2");

        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, _rx_b) = mpsc::channel(8);
        registry.register(&meeting, &UserId::new("a"), tx_a);
        registry.register(&other, &UserId::new("b"), tx_b);

        assert_eq!(registry.remove_meeting(&meeting), 1);
        assert_eq!(rx_a.recv().await, None, "sender dropped, channel closed");
        assert!(registry.is_connected(&other, &UserId::new("b")));
    }
}
