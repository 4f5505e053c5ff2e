//! Operator surface: counters and the shutdown broadcast.

use std::sync::Arc;

use powerline_lobby::LobbyManager;
use powerline_protocol::{Codec, Envelope, MessageType, ProtocolError, ShutdownPayload};
use powerline_session::SessionRegistry;
use powerline_transport::Frame;
use serde::Serialize;

/// Point-in-time server counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServerStats {
    /// Sessions held, attached or not.
    pub sessions: usize,
    /// Sessions with a live connection.
    pub attached: usize,
    pub lobbies: usize,
}

/// Cheap, clonable handle onto a running server's state.
///
/// Obtained from [`PowerlineServer::admin`](crate::PowerlineServer::admin)
/// before the server is moved into `run`.
#[derive(Clone)]
pub struct AdminHandle<C: Codec> {
    sessions: Arc<SessionRegistry>,
    lobbies: Arc<LobbyManager>,
    codec: C,
}

impl<C: Codec> AdminHandle<C> {
    pub(crate) fn new(sessions: Arc<SessionRegistry>, lobbies: Arc<LobbyManager>, codec: C) -> Self {
        Self {
            sessions,
            lobbies,
            codec,
        }
    }

    pub async fn stats(&self) -> ServerStats {
        ServerStats {
            sessions: self.sessions.len().await,
            attached: self.sessions.attached_count().await,
            lobbies: self.lobbies.len().await,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.len().await
    }

    pub async fn lobby_count(&self) -> usize {
        self.lobbies.len().await
    }

    /// Sends `SERVER_SHUTDOWN` to every attached connection, then closes
    /// them. Returns how many were notified.
    ///
    /// Sessions and lobbies are left in place.
    pub async fn broadcast_shutdown(&self, reason: &str) -> Result<usize, ProtocolError> {
        let envelope = Envelope::with_payload(
            MessageType::ServerShutdown,
            &ShutdownPayload {
                reason: reason.to_string(),
            },
        )?;
        let frame = Frame::from(self.codec.encode(&envelope)?);

        let mut notified = 0;
        for conn in self.sessions.attached_connections().await {
            if conn.send(Frame::clone(&frame)) {
                notified += 1;
            }
            conn.close();
        }
        tracing::info!(notified, %reason, "shutdown broadcast");
        Ok(notified)
    }
}

impl<C: Codec> std::fmt::Debug for AdminHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use powerline_lobby::{LobbyConfig, NewLobby, Participant};
    use powerline_maps::MapCatalog;
    use powerline_protocol::JsonCodec;
    use powerline_session::SessionConfig;
    use powerline_transport::{outbox, ConnectionId, OutboxConfig};

    use super::*;

    fn admin() -> AdminHandle<JsonCodec> {
        AdminHandle::new(
            Arc::new(SessionRegistry::new(SessionConfig::default())),
            Arc::new(LobbyManager::new(LobbyConfig::default(), Arc::new(MapCatalog::empty()))),
            JsonCodec,
        )
    }

    #[tokio::test]
    async fn test_stats_counts_sessions_and_lobbies() {
        let admin = admin();
        let (conn, _writer) = outbox(ConnectionId::new(1), &OutboxConfig::default());
        let info = admin.sessions.resolve(None, Some("Alice"), conn.clone()).await.session;
        admin
            .lobbies
            .create(
                NewLobby {
                    name: "Stats".into(),
                    ..NewLobby::default()
                },
                Participant {
                    session_id: info.session_id.clone(),
                    player_id: info.player_id,
                    player_name: info.player_name.clone(),
                },
            )
            .await
            .unwrap();
        admin.sessions.detach(&info.session_id, conn.id()).await;

        let stats = admin.stats().await;

        assert_eq!(
            stats,
            ServerStats {
                sessions: 1,
                attached: 0,
                lobbies: 1
            }
        );
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["lobbies"], 1);
    }

    #[tokio::test]
    async fn test_broadcast_shutdown_notifies_and_closes_attached() {
        let admin = admin();
        let (attached, _w1) = outbox(ConnectionId::new(1), &OutboxConfig::default());
        let (gone, _w2) = outbox(ConnectionId::new(2), &OutboxConfig::default());
        admin.sessions.resolve(None, Some("Alice"), attached.clone()).await;
        let detached = admin.sessions.resolve(None, Some("Bob"), gone.clone()).await.session;
        admin.sessions.detach(&detached.session_id, gone.id()).await;

        let notified = admin.broadcast_shutdown("maintenance").await.unwrap();

        assert_eq!(notified, 1);
        assert!(attached.is_closed());
        assert_eq!(admin.session_count().await, 2);
    }
}
