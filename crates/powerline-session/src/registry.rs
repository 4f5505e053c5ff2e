//! The session registry: every live session, keyed by session ID.
//!
//! # Locking
//!
//! The map is behind a `RwLock`; each session is behind its own `Mutex`.
//! The map lock is only ever held long enough to clone an `Arc` out (or
//! insert/remove one). It is never held while waiting on a session lock,
//! so the two can't form a cycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use powerline_protocol::{LobbyId, PlayerId, SessionId};
use powerline_transport::{ConnectionHandle, ConnectionId};
use rand::Rng;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::session::Session;
use crate::{SessionConfig, SessionError, SessionInfo};

type SessionEntry = Arc<Mutex<Session>>;

/// Outcome of [`SessionRegistry::resolve`].
#[derive(Debug)]
pub struct Resolved {
    pub session: SessionInfo,
    /// `true` when a new session was minted.
    pub is_new: bool,
    /// A different connection that was attached to this session until now.
    /// The caller should close it.
    pub replaced: Option<ConnectionHandle>,
}

/// Concurrency-safe registry of all sessions.
///
/// Shared as `Arc<SessionRegistry>` by every connection task and the
/// sweeper.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    next_player: AtomicU64,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_player: AtomicU64::new(1),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Binds `conn` to a session.
    ///
    /// If `claimed` names a live session, `conn` is attached to it and any
    /// other connection it had is handed back in [`Resolved::replaced`].
    /// An absent, unknown, evicted, or expired ID mints a new session with
    /// a fresh server-generated ID; client-chosen IDs are never adopted.
    ///
    /// `player_name` names new sessions only. A reconnect keeps the name
    /// the lobby roster already shows.
    pub async fn resolve(
        &self,
        claimed: Option<&SessionId>,
        player_name: Option<&str>,
        conn: ConnectionHandle,
    ) -> Resolved {
        if let Some(id) = claimed {
            let entry = self.entry(id).await;
            if let Some(entry) = entry {
                let mut session = entry.lock().await;
                if !session.evicted && !session.is_idle(Instant::now(), self.config.idle_timeout) {
                    let replaced = session.attach(conn);
                    tracing::info!(
                        session_id = %session.session_id,
                        player_id = %session.player_id,
                        replaced = replaced.is_some(),
                        "session resumed"
                    );
                    return Resolved {
                        session: session.info(),
                        is_new: false,
                        replaced,
                    };
                }
                tracing::debug!(session_id = %id, "claimed session expired, minting a new one");
            } else {
                tracing::debug!(session_id = %id, "claimed session unknown, minting a new one");
            }
        }

        Resolved {
            session: self.create(player_name, conn).await,
            is_new: true,
            replaced: None,
        }
    }

    async fn create(&self, player_name: Option<&str>, conn: ConnectionHandle) -> SessionInfo {
        let player_id = PlayerId(self.next_player.fetch_add(1, Ordering::Relaxed));
        let name = self.normalize_name(player_name, player_id);

        let mut sessions = self.sessions.write().await;
        let session_id = loop {
            let candidate = SessionId(generate_session_id());
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let session = Session::new(session_id.clone(), player_id, name, conn);
        let info = session.info();
        sessions.insert(session_id, Arc::new(Mutex::new(session)));
        drop(sessions);

        tracing::info!(session_id = %info.session_id, player_id = %player_id, name = %info.player_name, "session created");
        info
    }

    fn normalize_name(&self, requested: Option<&str>, player_id: PlayerId) -> String {
        let cleaned: String = requested
            .unwrap_or_default()
            .trim()
            .chars()
            .filter(|c| !c.is_control())
            .take(self.config.max_name_len)
            .collect();
        if cleaned.is_empty() {
            format!("Player {}", player_id.0)
        } else {
            cleaned
        }
    }

    /// Clears the session's connection if `conn_id` is the one attached.
    ///
    /// The session itself stays, with its lobby membership; the idle
    /// clock starts now. Returns `false` if the session is gone or has
    /// since moved to another connection.
    pub async fn detach(&self, session_id: &SessionId, conn_id: ConnectionId) -> bool {
        let Some(entry) = self.entry(session_id).await else {
            return false;
        };
        let mut session = entry.lock().await;
        if session.connection.as_ref().is_none_or(|c| c.id() != conn_id) {
            return false;
        }
        let now = Instant::now();
        session.connection = None;
        session.detached_since = now;
        session.last_activity = now;
        tracing::info!(%session_id, %conn_id, "session detached");
        true
    }

    /// Records activity. Returns `false` if the session is gone.
    pub async fn touch(&self, session_id: &SessionId) -> bool {
        let Some(entry) = self.entry(session_id).await else {
            return false;
        };
        let mut session = entry.lock().await;
        if session.evicted {
            return false;
        }
        session.last_activity = Instant::now();
        true
    }

    pub async fn get(&self, session_id: &SessionId) -> Option<SessionInfo> {
        let entry = self.entry(session_id).await?;
        let session = entry.lock().await;
        (!session.evicted).then(|| session.info())
    }

    /// Records which lobby the session is in (`None` when it leaves).
    pub async fn set_lobby(
        &self,
        session_id: &SessionId,
        lobby_id: Option<LobbyId>,
    ) -> Result<(), SessionError> {
        let entry = self
            .entry(session_id)
            .await
            .ok_or_else(|| SessionError::NotFound(session_id.clone()))?;
        let mut session = entry.lock().await;
        if session.evicted {
            return Err(SessionError::Evicted(session_id.clone()));
        }
        session.lobby_id = lobby_id;
        Ok(())
    }

    /// The connection currently attached to a session, if any.
    pub async fn connection(&self, session_id: &SessionId) -> Option<ConnectionHandle> {
        let entry = self.entry(session_id).await?;
        let session = entry.lock().await;
        session.connection.clone()
    }

    /// Attached connections of the given sessions, skipping detached or
    /// unknown ones.
    pub async fn connections_for<'a>(
        &self,
        session_ids: impl IntoIterator<Item = &'a SessionId>,
    ) -> Vec<ConnectionHandle> {
        let entries: Vec<SessionEntry> = {
            let sessions = self.sessions.read().await;
            session_ids
                .into_iter()
                .filter_map(|id| sessions.get(id).cloned())
                .collect()
        };
        let mut conns = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(conn) = entry.lock().await.connection.clone() {
                conns.push(conn);
            }
        }
        conns
    }

    /// Every attached connection on the server.
    pub async fn attached_connections(&self) -> Vec<ConnectionHandle> {
        let entries = self.entries().await;
        let mut conns = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(conn) = entry.lock().await.connection.clone() {
                conns.push(conn);
            }
        }
        conns
    }

    /// Evicts every session that is detached and has been idle for at
    /// least `idle_timeout`, returning what was evicted.
    ///
    /// Idleness is re-checked under each session's own lock, so a session
    /// that re-attached after the scan began is kept. An evicted session
    /// is marked first and then removed from the map; a concurrent
    /// `resolve` that already holds its `Arc` sees the mark and mints a
    /// new session.
    pub async fn expire_idle(&self, idle_timeout: std::time::Duration) -> Vec<SessionInfo> {
        let now = Instant::now();
        let mut expired = Vec::new();

        for entry in self.entries().await {
            let info = {
                let mut session = entry.lock().await;
                if session.evicted || !session.is_idle(now, idle_timeout) {
                    continue;
                }
                session.evicted = true;
                session.info()
            };
            self.sessions.write().await.remove(&info.session_id);
            tracing::info!(
                session_id = %info.session_id,
                player_id = %info.player_id,
                lobby_id = ?info.lobby_id,
                "idle session evicted"
            );
            expired.push(info);
        }

        expired
    }

    /// Number of sessions, attached or not.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Number of sessions with a live connection.
    pub async fn attached_count(&self) -> usize {
        self.attached_connections().await.len()
    }

    async fn entry(&self, session_id: &SessionId) -> Option<SessionEntry> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn entries(&self) -> Vec<SessionEntry> {
        self.sessions.read().await.values().cloned().collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

/// 32 lowercase hex characters (128 random bits).
fn generate_session_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use powerline_transport::{outbox, OutboxConfig, OutboxWriter};

    use super::*;
    use crate::SessionState;

    // -- Helpers ----------------------------------------------------------

    fn conn(id: u64) -> (ConnectionHandle, OutboxWriter) {
        outbox(ConnectionId::new(id), &OutboxConfig::default())
    }

    fn registry(idle_secs: u64) -> SessionRegistry {
        SessionRegistry::new(SessionConfig {
            idle_timeout: Duration::from_secs(idle_secs),
            ..SessionConfig::default()
        })
    }

    // =====================================================================
    // resolve()
    // =====================================================================

    #[tokio::test]
    async fn test_resolve_without_id_mints_new_session() {
        let reg = registry(300);
        let (h, _w) = conn(1);

        let r = reg.resolve(None, Some("Alice"), h).await;

        assert!(r.is_new);
        assert!(r.replaced.is_none());
        assert_eq!(r.session.session_id.as_str().len(), 32);
        assert!(r.session.session_id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(r.session.player_name, "Alice");
        assert_eq!(r.session.state, SessionState::Attached(ConnectionId::new(1)));
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn test_resolve_assigns_default_name() {
        let reg = registry(300);
        let (h, _w) = conn(1);
        let r = reg.resolve(None, Some("   "), h).await;
        assert_eq!(r.session.player_name, format!("Player {}", r.session.player_id.0));
    }

    #[tokio::test]
    async fn test_resolve_truncates_long_name() {
        let reg = registry(300);
        let (h, _w) = conn(1);
        let long = "x".repeat(100);
        let r = reg.resolve(None, Some(&long), h).await;
        assert_eq!(r.session.player_name.chars().count(), 32);
    }

    #[tokio::test]
    async fn test_resolve_unknown_id_is_not_adopted() {
        let reg = registry(300);
        let (h, _w) = conn(1);
        let claimed = SessionId::from("chosen-by-client");

        let r = reg.resolve(Some(&claimed), None, h).await;

        assert!(r.is_new);
        assert_ne!(r.session.session_id, claimed);
    }

    #[tokio::test]
    async fn test_resolve_existing_id_keeps_player_id() {
        let reg = registry(300);
        let (h1, _w1) = conn(1);
        let first = reg.resolve(None, Some("Alice"), h1).await.session;
        assert!(reg.detach(&first.session_id, ConnectionId::new(1)).await);

        let (h2, _w2) = conn(2);
        let second = reg.resolve(Some(&first.session_id), Some("Mallory"), h2).await;

        assert!(!second.is_new);
        assert_eq!(second.session.player_id, first.player_id);
        assert_eq!(second.session.player_name, "Alice");
        assert_eq!(second.session.state, SessionState::Attached(ConnectionId::new(2)));
    }

    #[tokio::test]
    async fn test_resolve_replaces_live_connection() {
        let reg = registry(300);
        let (h1, _w1) = conn(1);
        let first = reg.resolve(None, None, h1).await.session;

        let (h2, _w2) = conn(2);
        let second = reg.resolve(Some(&first.session_id), None, h2).await;

        let replaced = second.replaced.expect("conn-1 handed back");
        assert_eq!(replaced.id(), ConnectionId::new(1));
        let attached = reg.connection(&first.session_id).await.unwrap();
        assert_eq!(attached.id(), ConnectionId::new(2));
    }

    #[tokio::test]
    async fn test_resolve_preserves_lobby_membership() {
        let reg = registry(300);
        let (h1, _w1) = conn(1);
        let first = reg.resolve(None, None, h1).await.session;
        reg.set_lobby(&first.session_id, Some(LobbyId(7))).await.unwrap();

        let (h2, _w2) = conn(2);
        let second = reg.resolve(Some(&first.session_id), None, h2).await;
        assert_eq!(second.session.lobby_id, Some(LobbyId(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_expired_id_mints_new_session() {
        let reg = registry(60);
        let (h1, _w1) = conn(1);
        let first = reg.resolve(None, None, h1).await.session;
        reg.detach(&first.session_id, ConnectionId::new(1)).await;

        tokio::time::advance(Duration::from_secs(61)).await;

        let (h2, _w2) = conn(2);
        let second = reg.resolve(Some(&first.session_id), None, h2).await;
        assert!(second.is_new);
        assert_ne!(second.session.player_id, first.player_id);
    }

    // =====================================================================
    // detach()
    // =====================================================================

    #[tokio::test]
    async fn test_detach_keeps_session() {
        let reg = registry(300);
        let (h, _w) = conn(1);
        let s = reg.resolve(None, None, h).await.session;

        assert!(reg.detach(&s.session_id, ConnectionId::new(1)).await);

        let info = reg.get(&s.session_id).await.expect("still registered");
        assert!(!info.is_attached());
        assert!(reg.connection(&s.session_id).await.is_none());
    }

    #[tokio::test]
    async fn test_detach_stale_connection_is_ignored() {
        let reg = registry(300);
        let (h1, _w1) = conn(1);
        let s = reg.resolve(None, None, h1).await.session;
        let (h2, _w2) = conn(2);
        reg.resolve(Some(&s.session_id), None, h2).await;

        // conn-1's late close must not detach conn-2.
        assert!(!reg.detach(&s.session_id, ConnectionId::new(1)).await);
        assert_eq!(
            reg.get(&s.session_id).await.unwrap().state,
            SessionState::Attached(ConnectionId::new(2))
        );
    }

    #[tokio::test]
    async fn test_detach_unknown_session_returns_false() {
        let reg = registry(300);
        assert!(!reg.detach(&SessionId::from("nope"), ConnectionId::new(1)).await);
    }

    // =====================================================================
    // expire_idle()
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_expire_idle_evicts_detached_idle_sessions() {
        let reg = registry(60);
        let (h, _w) = conn(1);
        let s = reg.resolve(None, None, h).await.session;
        reg.set_lobby(&s.session_id, Some(LobbyId(3))).await.unwrap();
        reg.detach(&s.session_id, ConnectionId::new(1)).await;

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(reg.expire_idle(Duration::from_secs(60)).await.is_empty());

        tokio::time::advance(Duration::from_secs(31)).await;
        let evicted = reg.expire_idle(Duration::from_secs(60)).await;

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].lobby_id, Some(LobbyId(3)));
        assert!(reg.get(&s.session_id).await.is_none());
        assert!(reg.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_idle_never_evicts_attached_sessions() {
        let reg = registry(60);
        let (h, _w) = conn(1);
        let s = reg.resolve(None, None, h).await.session;

        tokio::time::advance(Duration::from_secs(24 * 3600)).await;

        assert!(reg.expire_idle(Duration::from_secs(60)).await.is_empty());
        assert!(reg.get(&s.session_id).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_resets_idle_clock() {
        let reg = registry(60);
        let (h, _w) = conn(1);
        let s = reg.resolve(None, None, h).await.session;
        reg.detach(&s.session_id, ConnectionId::new(1)).await;

        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(reg.touch(&s.session_id).await);
        tokio::time::advance(Duration::from_secs(50)).await;

        assert!(reg.expire_idle(Duration::from_secs(60)).await.is_empty());
    }

    #[tokio::test]
    async fn test_set_lobby_unknown_session_fails() {
        let reg = registry(60);
        let result = reg.set_lobby(&SessionId::from("ghost"), None).await;
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_connections_for_skips_detached() {
        let reg = registry(300);
        let (h1, _w1) = conn(1);
        let (h2, _w2) = conn(2);
        let a = reg.resolve(None, None, h1).await.session;
        let b = reg.resolve(None, None, h2).await.session;
        reg.detach(&b.session_id, ConnectionId::new(2)).await;

        let conns = reg.connections_for([&a.session_id, &b.session_id]).await;
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].id(), ConnectionId::new(1));
        assert_eq!(reg.attached_count().await, 1);
    }
}
