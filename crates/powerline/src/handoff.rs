//! Seams to the collaborators this server hands work to.
//!
//! The game engine itself lives elsewhere. When a lobby starts, the
//! dispatcher passes its roster through [`GameHandoff`] and gets back a
//! game ID. [`LobbyEvents`] is the analytics hook.

use async_trait::async_trait;
use powerline_protocol::{LobbyId, LobbySummary, RosterEntry};
use rand::Rng;

/// A game the engine accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameHandle {
    pub game_id: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum HandoffError {
    /// The engine could not be reached.
    #[error("game engine unavailable: {0}")]
    Unavailable(String),

    /// The engine refused this roster or map.
    #[error("{0}")]
    Rejected(String),
}

/// Starts a game for a lobby whose roster is ready.
///
/// Called with the lobby already in `starting`. `Ok` moves it to
/// `in_game`; `Err` sends it back to `waiting` with every ready flag
/// cleared.
#[async_trait]
pub trait GameHandoff: Send + Sync + 'static {
    async fn start_game(
        &self,
        lobby_id: LobbyId,
        roster: &[RosterEntry],
        map_id: Option<&str>,
    ) -> Result<GameHandle, HandoffError>;
}

/// Default handoff: mints a game ID and logs the roster.
///
/// Stands in for an engine when this server runs on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandoff;

#[async_trait]
impl GameHandoff for LoggingHandoff {
    async fn start_game(
        &self,
        lobby_id: LobbyId,
        roster: &[RosterEntry],
        map_id: Option<&str>,
    ) -> Result<GameHandle, HandoffError> {
        let suffix: u32 = rand::rng().random();
        let game_id = format!("G-{}-{suffix:08x}", lobby_id.0);
        tracing::info!(
            %lobby_id,
            %game_id,
            map_id = map_id.unwrap_or("-"),
            players = roster.len(),
            "game handed off"
        );
        Ok(GameHandle { game_id })
    }
}

/// Analytics hook. Every method defaults to doing nothing.
///
/// Called after the state change has happened, from the connection task
/// that caused it; implementations should not block.
pub trait LobbyEvents: Send + Sync + 'static {
    fn lobby_created(&self, _lobby: &LobbySummary) {}

    fn game_started(&self, _lobby_id: LobbyId, _game_id: &str, _players: usize) {}
}

/// A [`LobbyEvents`] that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl LobbyEvents for NoopEvents {}
