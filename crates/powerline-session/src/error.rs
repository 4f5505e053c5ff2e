//! Error types for the session layer.

use powerline_protocol::SessionId;

/// Errors returned by [`SessionRegistry`](crate::SessionRegistry).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session is registered under this ID.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The session was swept while the caller held a reference to it.
    #[error("session {0} has been evicted")]
    Evicted(SessionId),
}
