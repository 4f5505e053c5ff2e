//! Typed `data` payloads, one per message type.
//!
//! Request structs make every field optional: the dispatcher parses them
//! leniently and then reports the first missing field by name ("Lobby name
//! is required") rather than surfacing a serde error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{LobbyId, LobbyStatus, PlayerId, SessionId};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// `CONNECT` payload. The session ID itself rides in the envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    #[serde(default)]
    pub player_name: Option<String>,
}

/// `CREATE_LOBBY` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLobbyRequest {
    #[serde(default)]
    pub lobby_name: Option<String>,
    #[serde(default)]
    pub max_players: Option<usize>,
    #[serde(default)]
    pub map_id: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// `JOIN_LOBBY` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinLobbyRequest {
    #[serde(default)]
    pub lobby_id: Option<LobbyId>,
    #[serde(default)]
    pub password: Option<String>,
}

/// `SET_READY` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReadyRequest {
    #[serde(default)]
    pub ready: Option<bool>,
}

/// `CHAT` payload (client → server).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Whether a log entry was typed by a player or generated by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Chat,
    System,
}

/// One entry in a lobby's message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyMessage {
    /// Server-assigned, increasing within a lobby.
    pub id: u64,
    pub kind: MessageKind,
    /// Author, for chat messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A lobby member as other players see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberView {
    pub player_id: PlayerId,
    pub player_name: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub joined_at: DateTime<Utc>,
}

/// Full state of one lobby.
///
/// Never contains the password or any session ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyView {
    pub lobby_id: LobbyId,
    pub name: String,
    pub status: LobbyStatus,
    /// Bumped on every change. A client that sees views out of order keeps
    /// the one with the highest revision.
    pub revision: u64,
    /// Members in join order.
    pub members: Vec<MemberView>,
    pub messages: Vec<LobbyMessage>,
    pub max_players: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_id: Option<String>,
    pub has_password: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row in a lobby listing. No roster, no messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySummary {
    pub lobby_id: LobbyId,
    pub name: String,
    pub status: LobbyStatus,
    pub player_count: usize,
    pub max_players: usize,
    pub has_password: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row in a map listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSummary {
    pub map_id: String,
    pub name: String,
    pub description: String,
    pub min_players: usize,
    pub max_players: usize,
    pub recommended_players: Vec<usize>,
    pub city_count: usize,
}

/// A seat in a game being handed off, in turn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub seat: usize,
    pub player_id: PlayerId,
    pub player_name: String,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// `CONNECTED` payload. Only ever sent to the session's owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedPayload {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub player_name: String,
    /// `true` when an existing session was re-attached.
    pub reconnected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lobby_id: Option<LobbyId>,
}

/// `LOBBY_CREATED`, `LOBBY_JOINED`, and `LOBBY_UPDATED` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyPayload {
    pub lobby: LobbyView,
}

/// `LOBBY_LEFT` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyLeftPayload {
    pub lobby_id: LobbyId,
}

/// `LOBBIES_LISTED` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbiesListedPayload {
    pub lobbies: Vec<LobbySummary>,
}

/// `MAPS_LISTED` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapsListedPayload {
    pub maps: Vec<MapSummary>,
}

/// `GAME_STARTING` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStartingPayload {
    pub lobby_id: LobbyId,
    pub game_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_id: Option<String>,
    pub players: Vec<RosterEntry>,
}

/// `CHAT` payload (server → client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub lobby_id: LobbyId,
    pub message: LobbyMessage,
}

/// `ERROR` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// `SERVER_SHUTDOWN` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownPayload {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_lobby_request_all_fields_optional() {
        let req: CreateLobbyRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, CreateLobbyRequest::default());
    }

    #[test]
    fn test_create_lobby_request_parses_wire_names() {
        let req: CreateLobbyRequest = serde_json::from_str(
            r#"{"lobby_name":"Test","max_players":3,"map_id":"demo","password":"pw"}"#,
        )
        .unwrap();
        assert_eq!(req.lobby_name.as_deref(), Some("Test"));
        assert_eq!(req.max_players, Some(3));
        assert_eq!(req.map_id.as_deref(), Some("demo"));
        assert_eq!(req.password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_lobby_view_never_has_password_field() {
        let view = LobbyView {
            lobby_id: LobbyId(1),
            name: "Test".into(),
            status: LobbyStatus::Waiting,
            revision: 1,
            members: vec![],
            messages: vec![],
            max_players: 4,
            map_id: None,
            has_password: true,
            game_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&view).unwrap();

        assert!(json.get("password").is_none());
        assert_eq!(json["has_password"], true);
        assert_eq!(json["status"], "waiting");
    }

    #[test]
    fn test_chat_message_kind_serializes_snake_case() {
        let msg = LobbyMessage {
            id: 1,
            kind: MessageKind::System,
            player_id: None,
            player_name: None,
            text: "Alice joined the lobby".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["kind"], "system");
        assert!(json.get("player_id").is_none());
    }
}
