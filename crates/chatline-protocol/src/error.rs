//! Error types for the protocol layer.
//!
//! Each crate in Chatline defines its own error enum. When you see a
//! `ProtocolError`, the problem is in serialization, not in networking or
//! session handling.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust value).
    ///
    /// Common causes: malformed JSON, or a body missing a required field
    /// (e.g. a record without an `id`). Unknown fields are ignored, so a
    /// body from another endpoint only fails when it lacks one of ours.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The value decoded but violates a protocol rule, e.g. a user record
    /// with an empty `id`.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
