//! The lobby manager: creates, finds, lists, and cleans up lobbies.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use powerline_maps::MapCatalog;
use powerline_protocol::{LobbyId, LobbySummary, LobbyView, SessionId};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::lobby::MIN_PLAYERS;
use crate::{Lobby, LobbyConfig, LobbyError, Participant, Removal, StartTicket};

/// Parameters of `CREATE_LOBBY` after the dispatcher has read them.
#[derive(Debug, Clone, Default)]
pub struct NewLobby {
    pub name: String,
    pub max_players: Option<usize>,
    pub password: Option<String>,
    pub map_id: Option<String>,
}

/// What [`LobbyManager::leave`] did.
#[derive(Debug, Clone)]
pub struct Departure {
    pub lobby_id: LobbyId,
    pub removal: Removal,
    /// The lobby was emptied and removed.
    pub deleted: bool,
}

/// Concurrency-safe registry of every active lobby.
///
/// The map sits behind a `RwLock`: listing and lookups share it, creation
/// and deletion take it exclusively. Each [`Lobby`] has its own lock,
/// taken only after this one is released (or, in [`cleanup`](Self::cleanup),
/// while holding it, which keeps the manager-then-lobby order).
///
/// `create`, `join` and `leave` also hold a per-session seat lock for
/// their whole duration, taken before any other lock. Two requests for
/// the same session (say, from a connection and the one replacing it)
/// run one after the other, so a session never ends up seated twice.
pub struct LobbyManager {
    lobbies: RwLock<HashMap<LobbyId, Arc<Lobby>>>,
    seat_locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
    next_id: AtomicU64,
    config: LobbyConfig,
    catalog: Arc<MapCatalog>,
}

impl LobbyManager {
    pub fn new(config: LobbyConfig, catalog: Arc<MapCatalog>) -> Self {
        Self {
            lobbies: RwLock::new(HashMap::new()),
            seat_locks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
            catalog,
        }
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<MapCatalog> {
        &self.catalog
    }

    /// Creates a lobby with `host` seated as host and ready.
    ///
    /// Validates the name, resolves the map (explicit, configured default,
    /// or first in the catalog), and checks `max_players` against the
    /// configured cap and the map's player bounds.
    pub async fn create(&self, request: NewLobby, host: Participant) -> Result<Arc<Lobby>, LobbyError> {
        let _seat = self.seat_lock(&host.session_id).await;
        if let Some(current) = self.find_lobby_of_session(&host.session_id).await {
            return Err(LobbyError::AlreadyInLobby(current.id()));
        }

        let name = request.name.trim();
        if name.is_empty() {
            return Err(LobbyError::InvalidName("name is required".into()));
        }
        if name.chars().count() > self.config.max_lobby_name_len {
            return Err(LobbyError::InvalidName(format!(
                "must be at most {} characters",
                self.config.max_lobby_name_len
            )));
        }

        let map_id = self.resolve_map(request.map_id)?;
        let bounds = map_id
            .as_deref()
            .and_then(|id| self.catalog.get(id))
            .map(|map| (map.player_count.min, map.player_count.max));
        let cap = self.config.max_players_cap;
        let (floor, ceiling) = match bounds {
            Some((min, max)) => (min.max(MIN_PLAYERS), max.min(cap)),
            None => (MIN_PLAYERS, cap),
        };
        let requested = request.max_players.unwrap_or(self.config.default_max_players);
        let max_players = match request.max_players {
            Some(n) if (floor..=ceiling).contains(&n) => n,
            None if floor <= ceiling => requested.clamp(floor, ceiling),
            _ => {
                return Err(LobbyError::InvalidMaxPlayers {
                    requested,
                    min: floor,
                    max: ceiling,
                });
            }
        };

        let password = request.password.filter(|p| !p.is_empty());
        let lobby_id = LobbyId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let lobby = Arc::new(Lobby::new(
            lobby_id,
            name.to_owned(),
            host,
            max_players,
            password,
            map_id,
        ));

        self.lobbies.write().await.insert(lobby_id, Arc::clone(&lobby));
        tracing::info!(%lobby_id, name, max_players, map_id = ?lobby.map_id(), "lobby created");
        Ok(lobby)
    }

    fn resolve_map(&self, requested: Option<String>) -> Result<Option<String>, LobbyError> {
        match requested.filter(|id| !id.is_empty()) {
            Some(id) if self.catalog.contains(&id) => Ok(Some(id)),
            Some(id) => Err(LobbyError::MapNotFound(id)),
            None => Ok(self
                .config
                .default_map_id
                .as_ref()
                .filter(|id| self.catalog.contains(id))
                .cloned()
                .or_else(|| self.catalog.first_id().map(str::to_owned))),
        }
    }

    pub async fn get(&self, lobby_id: LobbyId) -> Option<Arc<Lobby>> {
        self.lobbies.read().await.get(&lobby_id).cloned()
    }

    /// Removes a lobby outright, marking it `ended` first. Returns whether
    /// it existed.
    pub async fn delete(&self, lobby_id: LobbyId) -> bool {
        let removed = self.lobbies.write().await.remove(&lobby_id);
        match removed {
            Some(lobby) => {
                lobby.end().await;
                tracing::info!(%lobby_id, "lobby deleted");
                true
            }
            None => false,
        }
    }

    /// Summaries of every lobby, oldest first.
    pub async fn list(&self) -> Vec<LobbySummary> {
        let mut summaries = Vec::new();
        for lobby in self.snapshot().await {
            summaries.push(lobby.summary().await);
        }
        summaries.sort_by_key(|s| (s.created_at, s.lobby_id));
        summaries
    }

    /// The lobby `session_id` is seated in, if any.
    ///
    /// Scans every lobby; the manager lock is released before any lobby
    /// lock is taken.
    pub async fn find_lobby_of_session(&self, session_id: &SessionId) -> Option<Arc<Lobby>> {
        for lobby in self.snapshot().await {
            if lobby.is_member(session_id).await {
                return Some(lobby);
            }
        }
        None
    }

    /// Seats `participant` in `lobby_id`.
    ///
    /// Re-joining the lobby the session is already in returns its current
    /// view unchanged.
    pub async fn join(
        &self,
        lobby_id: LobbyId,
        participant: Participant,
        password: Option<&str>,
    ) -> Result<(Arc<Lobby>, LobbyView), LobbyError> {
        let _seat = self.seat_lock(&participant.session_id).await;
        if let Some(current) = self.find_lobby_of_session(&participant.session_id).await {
            if current.id() == lobby_id {
                let view = current.view().await;
                return Ok((current, view));
            }
            return Err(LobbyError::AlreadyInLobby(current.id()));
        }

        let lobby = self.get(lobby_id).await.ok_or(LobbyError::NotFound(lobby_id))?;
        let view = lobby.add_member(participant, password).await?;
        Ok((lobby, view))
    }

    /// Takes `session_id` out of whatever lobby it is in, deleting the
    /// lobby if that emptied it.
    pub async fn leave(&self, session_id: &SessionId) -> Result<Departure, LobbyError> {
        let _seat = self.seat_lock(session_id).await;
        let lobby = self
            .find_lobby_of_session(session_id)
            .await
            .ok_or(LobbyError::NotInLobby)?;
        let lobby_id = lobby.id();
        let removal = lobby
            .remove_member(session_id)
            .await
            .ok_or(LobbyError::NotMember(lobby_id))?;
        let deleted = removal.remaining == 0 && self.cleanup(lobby_id).await;
        Ok(Departure {
            lobby_id,
            removal,
            deleted,
        })
    }

    /// Deletes `lobby_id` if its roster is empty. Returns whether it did.
    ///
    /// The lobby is marked `ended` under its own lock before it leaves the
    /// map, so a join that already holds the `Arc` fails instead of
    /// seating someone in a deleted lobby.
    pub async fn cleanup(&self, lobby_id: LobbyId) -> bool {
        let mut lobbies = self.lobbies.write().await;
        let Some(lobby) = lobbies.get(&lobby_id).cloned() else {
            return false;
        };
        if !lobby.end_if_empty().await {
            return false;
        }
        lobbies.remove(&lobby_id);
        drop(lobbies);
        tracing::info!(%lobby_id, "empty lobby removed");
        true
    }

    /// Moves `lobby_id` to `starting` on behalf of `requester`, enforcing
    /// host, readiness, and the selected map's player bounds.
    pub async fn start_game(&self, lobby_id: LobbyId, requester: &SessionId) -> Result<StartTicket, LobbyError> {
        let lobby = self.get(lobby_id).await.ok_or(LobbyError::NotFound(lobby_id))?;
        let map = lobby.map_id().and_then(|id| self.catalog.get(id));
        lobby.start(requester, map.as_ref().map(|m| &m.player_count)).await
    }

    pub async fn len(&self) -> usize {
        self.lobbies.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.lobbies.read().await.is_empty()
    }

    /// Serializes membership changes for one session. Entries nobody
    /// holds are pruned on the way in.
    async fn seat_lock(&self, session_id: &SessionId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.seat_locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(session_id.clone()).or_default())
        };
        lock.lock_owned().await
    }

    async fn snapshot(&self) -> Vec<Arc<Lobby>> {
        self.lobbies.read().await.values().cloned().collect()
    }
}
