//! Core types and error definitions shared by the maestro crates.
//!
//! # Main types
//!
//! - [`MaestroError`] — Unified error enum for all maestro subsystems.
//! - [`MaestroResult`] — Convenience alias for `Result<T, MaestroError>`.
//! - [`Message`] — Envelope for out-of-band communication with agents.
//! - [`MessageType`] — Kind of notice carried by a [`Message`].

/// Error type shared across crates.
pub mod error;
/// Inter-agent message envelope.
pub mod message;

pub use error::{MaestroError, MaestroResult};
pub use message::{Message, MessageType};
