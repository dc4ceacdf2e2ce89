//! HTTP and WebSocket handlers.
//!
//! - [`channel`] - the push channel (`GET /v1/meetings/{id}/channel`)
//! - [`action`] - the action endpoint (`POST /v1/meetings/actions`)

pub mod action;
pub mod channel;
