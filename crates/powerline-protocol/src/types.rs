//! Core protocol types: identities, the message-type set, and the envelope.
//!
//! Every frame on the wire is one JSON [`Envelope`]:
//!
//! ```text
//! { "type": "JOIN_LOBBY",
//!   "session_id": "9f2c...",      ← durable identity, echoed by the server
//!   "player_id": 7,               ← optional
//!   "game_id": "G-3-...",         ← optional, set once a game is handed off
//!   "timestamp": "2026-...Z",
//!   "data": { "lobby_id": 3 } }   ← shape depends on "type"
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A durable, server-assigned player number.
///
/// Stable for the life of a session: reconnecting with the same session ID
/// yields the same `PlayerId`. Serializes as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Identifier of a pending game room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LobbyId(pub u64);

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L-{}", self.0)
    }
}

/// Opaque session identifier.
///
/// Possession of a session ID is the only credential this layer checks, so
/// session IDs are handed to their owner and never broadcast to other
/// players.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// LobbyStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a lobby.
///
/// ```text
/// Waiting → Starting → InGame → Ended
///    ↑         │
///    └─────────┘  (handoff failed)
/// ```
///
/// `Waiting` is the only state that admits new members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyStatus {
    Waiting,
    Starting,
    InGame,
    Ended,
}

impl LobbyStatus {
    /// Returns `true` if the lobby accepts joins.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` if transitioning to `target` is allowed.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Waiting, Self::Starting)
                | (Self::Starting, Self::InGame)
                | (Self::Starting, Self::Waiting)
                | (Self::InGame, Self::Ended)
                | (Self::Waiting, Self::Ended)
                | (Self::Starting, Self::Ended)
        )
    }

    /// The wire spelling of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Starting => "starting",
            Self::InGame => "in_game",
            Self::Ended => "ended",
        }
    }
}

impl fmt::Display for LobbyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// The closed set of message types.
///
/// Anything a client sends that is not in this list deserializes as
/// [`MessageType::Unknown`] so the server can answer with an `ERROR`
/// instead of dropping the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    // -- Identity --
    Connect,
    Connected,

    // -- Lobby lifecycle --
    CreateLobby,
    LobbyCreated,
    JoinLobby,
    LobbyJoined,
    LeaveLobby,
    LobbyLeft,
    LobbyUpdated,
    SetReady,
    StartGame,
    GameStarting,

    // -- Discovery --
    ListLobbies,
    LobbiesListed,
    ListMaps,
    MapsListed,

    // -- Misc --
    Chat,
    Ping,
    Pong,
    ServerShutdown,
    Error,

    /// Any `type` string not listed above. Never sent by the server.
    #[serde(other)]
    Unknown,
}

impl MessageType {
    /// The wire spelling of this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::CreateLobby => "CREATE_LOBBY",
            Self::LobbyCreated => "LOBBY_CREATED",
            Self::JoinLobby => "JOIN_LOBBY",
            Self::LobbyJoined => "LOBBY_JOINED",
            Self::LeaveLobby => "LEAVE_LOBBY",
            Self::LobbyLeft => "LOBBY_LEFT",
            Self::LobbyUpdated => "LOBBY_UPDATED",
            Self::SetReady => "SET_READY",
            Self::StartGame => "START_GAME",
            Self::GameStarting => "GAME_STARTING",
            Self::ListLobbies => "LIST_LOBBIES",
            Self::LobbiesListed => "LOBBIES_LISTED",
            Self::ListMaps => "LIST_MAPS",
            Self::MapsListed => "MAPS_LISTED",
            Self::Chat => "CHAT",
            Self::Ping => "PING",
            Self::Pong => "PONG",
            Self::ServerShutdown => "SERVER_SHUTDOWN",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level wire frame.
///
/// `data` stays an untyped JSON value at this level; handlers parse it into
/// the request struct matching `kind` with [`Envelope::parse_data`], which
/// keeps a malformed payload a per-request error instead of an
/// undecodable frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,

    /// Sender's wall-clock time. Filled with "now" when a client omits it.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    /// Creates an envelope of the given type with no payload.
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            session_id: None,
            player_id: None,
            game_id: None,
            timestamp: Utc::now(),
            data: serde_json::Value::Null,
        }
    }

    /// Creates an envelope carrying `payload` as its `data`.
    pub fn with_payload<T: Serialize>(kind: MessageType, payload: &T) -> Result<Self, ProtocolError> {
        let data = serde_json::to_value(payload).map_err(ProtocolError::Encode)?;
        Ok(Self {
            data,
            ..Self::new(kind)
        })
    }

    /// An `ERROR` envelope with a human-readable message.
    pub fn error(message: impl Into<String>) -> Self {
        let data = serde_json::json!({ "message": message.into() });
        Self {
            data,
            ..Self::new(MessageType::Error)
        }
    }

    pub fn session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn player(mut self, player_id: PlayerId) -> Self {
        self.player_id = Some(player_id);
        self
    }

    pub fn game(mut self, game_id: impl Into<String>) -> Self {
        self.game_id = Some(game_id.into());
        self
    }

    /// The client-supplied session ID, treating `""` as absent.
    pub fn claimed_session(&self) -> Option<&SessionId> {
        self.session_id.as_ref().filter(|id| !id.0.is_empty())
    }

    /// Parses `data` into the request type for this message.
    ///
    /// A missing or `null` payload is treated as `{}`, so request structs
    /// whose fields are all optional parse and can report *which* field
    /// is missing.
    pub fn parse_data<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let value = if self.data.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            self.data.clone()
        };
        serde_json::from_value(value).map_err(|source| ProtocolError::InvalidPayload {
            kind: self.kind,
            source,
        })
    }
}
