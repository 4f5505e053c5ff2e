//! Idle-session sweeper.
//!
//! Sessions outlive their sockets so a player can reconnect. The sweeper
//! is what eventually gives up on them: every `scan_interval` it evicts
//! detached sessions that have been silent for `idle_timeout` and takes
//! them out of their lobbies, which may migrate the host or delete the
//! lobby.

use std::sync::Arc;

use powerline_lobby::LobbyError;
use powerline_protocol::Codec;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::server::ServerState;

/// What one pass of the sweeper did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions_evicted: usize,
    pub lobbies_removed: usize,
}

/// Runs one sweep.
///
/// A session is evicted before it leaves its lobby. Between the two
/// steps it can't be re-attached, so nobody reconnects into a seat that
/// is about to be taken away.
pub(crate) async fn sweep_once<C: Codec>(state: &ServerState<C>) -> SweepReport {
    let idle_timeout = state.config.sweep.idle_timeout;
    let expired = state.sessions.expire_idle(idle_timeout).await;

    let mut report = SweepReport {
        sessions_evicted: expired.len(),
        ..SweepReport::default()
    };

    for session in expired {
        let departure = match state.lobbies.leave(&session.session_id).await {
            Ok(departure) => departure,
            Err(LobbyError::NotInLobby) => continue,
            Err(e) => {
                tracing::warn!(session_id = %session.session_id, error = %e, "sweeper could not remove session from lobby");
                continue;
            }
        };

        if departure.deleted {
            report.lobbies_removed += 1;
            continue;
        }
        tracing::info!(
            lobby_id = %departure.lobby_id,
            player_id = %session.player_id,
            new_host = ?departure.removal.new_host,
            "idle player removed from lobby"
        );
        if let Some(lobby) = state.lobbies.get(departure.lobby_id).await {
            let remaining = lobby.member_sessions().await;
            if let Err(e) = state.broadcast_lobby(&departure.removal.view, &remaining).await {
                tracing::error!(lobby_id = %departure.lobby_id, error = %e, "failed to encode lobby update");
            }
        }
    }

    if report.sessions_evicted > 0 {
        tracing::info!(
            evicted = report.sessions_evicted,
            lobbies_removed = report.lobbies_removed,
            "sweep finished"
        );
    }
    report
}

/// Sweeps every `scan_interval` until `shutdown` is cancelled.
pub(crate) async fn run_sweeper<C: Codec>(state: Arc<ServerState<C>>, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(state.config.sweep.scan_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                sweep_once(&state).await;
            }
        }
    }
    tracing::debug!("sweeper stopped");
}
