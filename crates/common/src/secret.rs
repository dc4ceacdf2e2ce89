//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate with
//! Parley-specific guidance. Use these types for all sensitive values:
//! signing secrets, collaborator API keys, bearer tokens.
//!
//! `SecretString` implements `Debug` with redaction, so any struct that
//! derives `Debug` while holding one cannot leak the value through `{:?}`
//! or tracing fields. Secrets are zeroized on drop.
//!
//! To read the actual value, call `expose_secret()` explicitly:
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! let secret = SecretString::from("hunter2");
//! assert_eq!(secret.expose_secret(), "hunter2");
//! assert!(!format!("{secret:?}").contains("hunter2"));
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
