//! Actor model for the signaling core.
//!
//! ```text
//! SessionSupervisor (singleton per instance)
//! └── supervises N SessionActors
//!     └── SessionActor (one per active meeting)
//!         └── owns that meeting's SessionState
//! ```
//!
//! # Key Design Decisions
//!
//! - **At-most-one concurrent mutator per meeting**: each meeting's state
//!   is owned by a single actor whose message handling never awaits, so a
//!   mutation cannot suspend and interleave with another
//! - **Collaborator lookups happen before the mailbox**: the channel
//!   handler resolves creator and profile lookups, then sends the result
//!   in the join message
//! - **CancellationToken propagation**: the supervisor's root token fans
//!   out to session actors for graceful shutdown
//!
//! # Modules
//!
//! - [`supervisor`] - `SessionSupervisor` singleton that owns sessions
//! - [`session`] - `SessionActor` per active meeting
//! - [`messages`] - Message types for actor communication

pub mod messages;
pub mod session;
pub mod supervisor;

// Re-export primary types
pub use messages::{Caller, HostLookup, JoinAck, SessionMessage};
pub use session::{SessionActor, SessionHandle};
pub use supervisor::{SessionSupervisorHandle, SupervisorStatus};
