//! Error types for the server crate.
//!
//! Two families live here. [`PowerlineError`] is for process-scope
//! failures (binding, loading maps) and wraps every layer's error.
//! [`RequestError`] is what a single client request can fail with; the
//! dispatcher turns it into an `ERROR` reply and keeps the connection.

use powerline_lobby::LobbyError;
use powerline_maps::MapError;
use powerline_protocol::ProtocolError;
use powerline_session::SessionError;
use powerline_transport::TransportError;

use crate::HandoffError;

/// Top-level error that wraps all crate-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum PowerlineError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// A setting the server can't run with, caught before binding.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// A client request that could not be satisfied.
///
/// The `Display` text is exactly what goes in the `ERROR` reply's
/// `message` field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// A required field is missing or malformed, or the request is not
    /// allowed in the current state.
    #[error("{0}")]
    Validation(String),

    /// Unknown lobby, session, or map.
    #[error("{0}")]
    NotFound(String),

    /// Lobby full, or start preconditions unmet.
    #[error("{0}")]
    Capacity(String),

    /// Message before identification, or an unknown message type.
    #[error("{0}")]
    Protocol(String),
}

impl RequestError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Capacity(_) => "capacity",
            Self::Protocol(_) => "protocol",
        }
    }
}

impl From<LobbyError> for RequestError {
    fn from(err: LobbyError) -> Self {
        match err {
            LobbyError::NotFound(_) => Self::NotFound("Lobby not found".into()),
            LobbyError::Full(_) => Self::Capacity("Lobby is full".into()),
            LobbyError::AlreadyMember(_) => Self::Validation("Already in this lobby".into()),
            LobbyError::AlreadyInLobby(_) => Self::Validation("Already in a lobby".into()),
            LobbyError::NotMember(_) | LobbyError::NotInLobby => {
                Self::Validation("Not in a lobby".into())
            }
            LobbyError::NotJoinable(_, status) => {
                Self::Validation(format!("Lobby is {status} and not accepting players"))
            }
            LobbyError::NotHost => Self::Validation("Only the host can start the game".into()),
            LobbyError::NotReady => Self::Capacity("All players must be ready".into()),
            LobbyError::NotEnoughPlayers { need, .. } => {
                Self::Capacity(format!("At least {need} players are required"))
            }
            LobbyError::PlayerCount { min, max, .. } => {
                Self::Capacity(format!("This map needs {min} to {max} players"))
            }
            LobbyError::InvalidName(reason) => Self::Validation(format!("Invalid lobby name: {reason}")),
            LobbyError::InvalidMaxPlayers { min, max, .. } => {
                Self::Validation(format!("Max players must be between {min} and {max}"))
            }
            LobbyError::MapNotFound(map_id) => Self::NotFound(format!("Map not found: {map_id}")),
            LobbyError::WrongPassword => Self::Validation("Invalid lobby password".into()),
            LobbyError::InvalidState { status, .. } => Self::Validation(format!("Lobby is {status}")),
        }
    }
}

impl From<SessionError> for RequestError {
    fn from(_: SessionError) -> Self {
        Self::NotFound("Player not found".into())
    }
}

impl From<ProtocolError> for RequestError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidPayload { kind, .. } => {
                Self::Validation(format!("Invalid {kind} payload"))
            }
            ProtocolError::Decode(_) => Self::Protocol("Invalid message format".into()),
            ProtocolError::Encode(_) => Self::Protocol("Internal server error".into()),
        }
    }
}

impl From<HandoffError> for RequestError {
    fn from(err: HandoffError) -> Self {
        Self::Capacity(format!("Game could not be started: {err}"))
    }
}
