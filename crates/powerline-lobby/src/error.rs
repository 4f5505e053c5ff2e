//! Error types for the lobby layer.

use powerline_protocol::{LobbyId, LobbyStatus};

/// Errors that can occur during lobby operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("lobby {0} not found")]
    NotFound(LobbyId),

    /// The roster is at `max_players`.
    #[error("lobby {0} is full")]
    Full(LobbyId),

    /// The session is already in this lobby.
    #[error("already a member of lobby {0}")]
    AlreadyMember(LobbyId),

    /// The session is in a different lobby.
    #[error("already in lobby {0}")]
    AlreadyInLobby(LobbyId),

    #[error("not a member of lobby {0}")]
    NotMember(LobbyId),

    /// The session isn't in any lobby.
    #[error("not in a lobby")]
    NotInLobby,

    #[error("lobby {0} is {1} and not accepting players")]
    NotJoinable(LobbyId, LobbyStatus),

    #[error("only the host can start the game")]
    NotHost,

    #[error("not all players are ready")]
    NotReady,

    #[error("need at least {need} players, have {have}")]
    NotEnoughPlayers { have: usize, need: usize },

    /// Roster size is outside the selected map's player bounds.
    #[error("map {map_id} needs {min}-{max} players, have {have}")]
    PlayerCount {
        map_id: String,
        have: usize,
        min: usize,
        max: usize,
    },

    #[error("invalid lobby name: {0}")]
    InvalidName(String),

    #[error("max players must be between {min} and {max}, got {requested}")]
    InvalidMaxPlayers {
        requested: usize,
        min: usize,
        max: usize,
    },

    #[error("map {0} not found")]
    MapNotFound(String),

    #[error("invalid lobby password")]
    WrongPassword,

    /// The operation isn't allowed in the lobby's current status.
    #[error("lobby {lobby_id} is {status}")]
    InvalidState {
        lobby_id: LobbyId,
        status: LobbyStatus,
    },
}
