//! Session types: the server's record of one player.

use std::time::Duration;

use chrono::{DateTime, Utc};
use powerline_protocol::{LobbyId, PlayerId, SessionId};
use powerline_transport::{ConnectionHandle, ConnectionId};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Tunables for the session registry.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a detached session may stay silent before it counts as
    /// expired. An expired session is never re-attached, even before the
    /// sweeper gets to it. The server sets this to its sweep threshold.
    ///
    /// Default: 5 minutes.
    pub idle_timeout: Duration,

    /// Longest display name kept, in characters. Longer names are cut.
    ///
    /// Default: 32.
    pub max_name_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(5 * 60),
            max_name_len: 32,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Whether a session currently has a live connection.
///
/// ```text
///   Attached(conn) ──(close)──→ Detached ──(idle_timeout)──→ swept
///        ↑                         │
///        └──────(CONNECT)──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Attached(ConnectionId),
    Detached { since: Instant },
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The mutable record behind one session ID. Lives inside the registry's
/// per-session mutex and never leaves it; callers get [`SessionInfo`].
#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) session_id: SessionId,
    pub(crate) player_id: PlayerId,
    pub(crate) player_name: String,
    pub(crate) connection: Option<ConnectionHandle>,
    pub(crate) detached_since: Instant,
    pub(crate) last_activity: Instant,
    pub(crate) lobby_id: Option<LobbyId>,
    /// Set by the sweeper just before the entry is removed from the map.
    /// Anyone who cloned the `Arc` earlier sees this and backs off.
    pub(crate) evicted: bool,
    pub(crate) created_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(
        session_id: SessionId,
        player_id: PlayerId,
        player_name: String,
        connection: ConnectionHandle,
    ) -> Self {
        let now = Instant::now();
        Self {
            session_id,
            player_id,
            player_name,
            connection: Some(connection),
            detached_since: now,
            last_activity: now,
            lobby_id: None,
            evicted: false,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        match &self.connection {
            Some(conn) => SessionState::Attached(conn.id()),
            None => SessionState::Detached {
                since: self.detached_since,
            },
        }
    }

    /// Detached and silent for at least `idle_timeout`.
    ///
    /// An attached session is never idle: the open connection is the
    /// activity.
    pub(crate) fn is_idle(&self, now: Instant, idle_timeout: Duration) -> bool {
        self.connection.is_none() && now.saturating_duration_since(self.last_activity) >= idle_timeout
    }

    /// Attaches `conn`, returning the previously attached connection if it
    /// was a different one.
    pub(crate) fn attach(&mut self, conn: ConnectionHandle) -> Option<ConnectionHandle> {
        self.last_activity = Instant::now();
        let new_id = conn.id();
        match self.connection.replace(conn) {
            Some(prev) if prev.id() != new_id => Some(prev),
            _ => None,
        }
    }

    pub(crate) fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            player_id: self.player_id,
            player_name: self.player_name.clone(),
            state: self.state(),
            lobby_id: self.lobby_id,
            last_activity: self.last_activity,
            created_at: self.created_at,
        }
    }
}

/// A point-in-time copy of a session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub state: SessionState,
    pub lobby_id: Option<LobbyId>,
    pub last_activity: Instant,
    pub created_at: DateTime<Utc>,
}

impl SessionInfo {
    pub fn is_attached(&self) -> bool {
        matches!(self.state, SessionState::Attached(_))
    }
}
