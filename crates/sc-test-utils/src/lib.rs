//! Test utilities for the Parley Signaling Controller.
//!
//! - [`test_ids`] - fixed, deterministic meeting/user identifiers
//! - [`tokens`] - bearer-token builder for authenticated test requests
//! - [`directories`] - in-memory meeting/user directory fakes

pub mod directories;
pub mod test_ids;
pub mod tokens;
