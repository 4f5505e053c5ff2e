//! Error types for the protocol layer.

use crate::MessageType;

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame is not a well-formed envelope: malformed JSON, a missing
    /// `type`, or wrongly typed envelope fields.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The envelope parsed, but its `data` does not fit the shape its
    /// `type` requires (e.g. `"ready": "yes"` on `SET_READY`).
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: MessageType,
        #[source]
        source: serde_json::Error,
    },
}
