//! Parley Signaling Controller
//!
//! The real-time session signaling core of the Parley meeting platform:
//! tracks which users are connected to which meeting, arbitrates joins
//! (host fast-path vs. waiting room), partitions participants into
//! breakout rooms, relays peer-connection negotiation payloads, and
//! enforces chat/recording moderation policy.
//!
//! # Architecture
//!
//! ```text
//! SessionSupervisor (singleton)
//! └── SessionActor (one per active meeting, owns SessionState)
//!     ⇅ ConnectionRegistry ((meeting, user) → push channel)
//! ```
//!
//! Every mutation and read of one meeting's state goes through that
//! meeting's actor mailbox, which is the per-meeting serialization point;
//! message handling never awaits, so no operation suspends mid-mutation.
//! Different meetings never block each other.
//!
//! All state is ephemeral and in-process; nothing survives a restart, and
//! clients rebuild their view by reconnecting.
//!
//! # Modules
//!
//! - [`actors`] - session supervisor and per-meeting session actors
//! - [`registry`] - connection registry (identity → push channel)
//! - [`session`] - per-meeting session state and its invariants
//! - [`protocol`] - event frames and the action envelope
//! - [`directory`] - meeting/user directory collaborators
//! - [`auth`] - bearer-token verification
//! - [`handlers`] - push channel and action endpoint
//! - [`routes`] - router assembly and shared state
//! - [`config`] - service configuration from environment
//! - [`errors`] - error taxonomy with HTTP mapping
//! - [`observability`] - health probes and metric helpers

#![warn(clippy::pedantic)]

pub mod actors;
pub mod auth;
pub mod config;
pub mod directory;
pub mod errors;
pub mod handlers;
pub mod observability;
pub mod protocol;
pub mod registry;
pub mod routes;
pub mod session;
