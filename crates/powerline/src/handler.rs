//! Per-connection handler: identification and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Finish the WebSocket upgrade (bounded by the transport's timeout)
//!   2. Set up the outbox and spawn its writer
//!   3. Wait for `CONNECT` (only `PING` is answered before it)
//!   4. Bind the connection to a session, resend the lobby snapshot
//!   5. Loop: receive envelopes, dispatch, reply `ERROR` on failure
//!
//! Failures of a single request never close the connection. The socket
//! closing, a read timeout, or the outbox being closed (replacement by a
//! newer connection, overflow, shutdown) end the loop.

use std::sync::Arc;

use powerline_lobby::{Lobby, LobbyError, NewLobby, Participant};
use powerline_protocol::{
    ChatPayload, ChatRequest, Codec, ConnectRequest, ConnectedPayload, CreateLobbyRequest, Envelope,
    GameStartingPayload, JoinLobbyRequest, LobbiesListedPayload, LobbyLeftPayload, LobbyPayload,
    MapsListedPayload, MessageType, PlayerId, ProtocolError, SessionId, SetReadyRequest,
};
use powerline_session::{SessionInfo, SessionRegistry};
use powerline_transport::{outbox, Connection, ConnectionHandle, ConnectionId, Handshake, WebSocketUpgrade};
use tokio::time::Instant;

use crate::server::ServerState;
use crate::{PowerlineError, RequestError};

/// Drop guard that detaches the session when the handler exits.
///
/// `Drop` is synchronous, so the detach runs as a fire-and-forget task.
/// The registry ignores it if the session has already moved to another
/// connection.
struct DetachGuard {
    session_id: SessionId,
    conn_id: ConnectionId,
    sessions: Arc<SessionRegistry>,
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        let session_id = self.session_id.clone();
        let conn_id = self.conn_id;
        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            sessions.detach(&session_id, conn_id).await;
        });
    }
}

/// Who this connection speaks for once `CONNECT` succeeded.
#[derive(Debug, Clone)]
struct Identity {
    session_id: SessionId,
    player_id: PlayerId,
    player_name: String,
}

impl Identity {
    fn participant(&self) -> Participant {
        Participant {
            session_id: self.session_id.clone(),
            player_id: self.player_id,
            player_name: self.player_name.clone(),
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    pending: WebSocketUpgrade,
    state: Arc<ServerState<C>>,
) -> Result<(), PowerlineError> {
    let conn = pending.establish().await?;
    let conn_id = conn.id();
    let peer = conn.peer_addr();
    tracing::debug!(%conn_id, %peer, "handling new connection");

    let conn = Arc::new(conn);
    let (handle, writer) = outbox(conn_id, &state.config.outbox);
    tokio::spawn(writer.run(Arc::clone(&conn)));

    let mut dispatcher = Dispatcher {
        state: Arc::clone(&state),
        handle: handle.clone(),
        identity: None,
        _detach: None,
    };
    let connect_deadline = Instant::now() + state.config.connect_timeout;

    loop {
        let deadline = match dispatcher.identity {
            None => Some(connect_deadline),
            Some(_) => state.config.read_timeout.map(|t| Instant::now() + t),
        };
        let next = async {
            match deadline {
                Some(at) => tokio::time::timeout_at(at, conn.recv()).await.ok(),
                None => Some(conn.recv().await),
            }
        };

        let received = tokio::select! {
            biased;
            _ = handle.closed() => {
                tracing::debug!(%conn_id, "outbox closed");
                break;
            }
            received = next => received,
        };

        let data = match received {
            Some(Ok(Some(data))) => data,
            Some(Ok(None)) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Some(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
            None if dispatcher.identity.is_none() => {
                tracing::info!(%conn_id, "no CONNECT before deadline");
                dispatcher.reply(&Envelope::error("Connection timed out waiting for CONNECT"))?;
                break;
            }
            None => {
                tracing::info!(%conn_id, "connection timed out");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                dispatcher.reply(&Envelope::error("Invalid message format"))?;
                continue;
            }
        };

        let kind = envelope.kind;
        if let Err(err) = dispatcher.dispatch(envelope).await {
            if matches!(err, RequestError::Protocol(_)) {
                tracing::warn!(%conn_id, message_type = %kind, error = %err, "protocol misuse");
            } else {
                tracing::debug!(%conn_id, message_type = %kind, error_kind = err.kind(), error = %err, "request rejected");
            }
            dispatcher.reply(&Envelope::error(err.to_string()))?;
        }
    }

    // Flushes anything still queued, then closes the socket. The guard
    // drops with the dispatcher and detaches the session.
    handle.close();
    drop(dispatcher);
    Ok(())
}

struct Dispatcher<C: Codec> {
    state: Arc<ServerState<C>>,
    handle: ConnectionHandle,
    identity: Option<Identity>,
    _detach: Option<DetachGuard>,
}

impl<C: Codec> Dispatcher<C> {
    /// Queues a frame for this connection only.
    fn reply(&self, envelope: &Envelope) -> Result<(), ProtocolError> {
        let frame = self.state.frame(envelope)?;
        if !self.handle.send(frame) {
            tracing::debug!(conn_id = %self.handle.id(), kind = %envelope.kind, "reply dropped, connection closed");
        }
        Ok(())
    }

    async fn dispatch(&mut self, envelope: Envelope) -> Result<(), RequestError> {
        if let Some(identity) = &self.identity {
            self.state.sessions.touch(&identity.session_id).await;
        }

        match envelope.kind {
            MessageType::Ping => return self.on_ping(&envelope),
            MessageType::Connect => return self.on_connect(&envelope).await,
            MessageType::Unknown => {
                return Err(RequestError::Protocol("Unknown message type".into()));
            }
            _ => {}
        }

        let identity = self
            .identity
            .clone()
            .ok_or_else(|| RequestError::Protocol("Not connected".into()))?;

        match envelope.kind {
            MessageType::CreateLobby => self.on_create_lobby(&identity, &envelope).await,
            MessageType::JoinLobby => self.on_join_lobby(&identity, &envelope).await,
            MessageType::LeaveLobby => self.on_leave_lobby(&identity).await,
            MessageType::SetReady => self.on_set_ready(&identity, &envelope).await,
            MessageType::StartGame => self.on_start_game(&identity).await,
            MessageType::ListLobbies => {
                let lobbies = self.state.lobbies.list().await;
                self.reply(&Envelope::with_payload(
                    MessageType::LobbiesListed,
                    &LobbiesListedPayload { lobbies },
                )?)?;
                Ok(())
            }
            MessageType::ListMaps => {
                let maps = self.state.lobbies.catalog().list();
                self.reply(&Envelope::with_payload(
                    MessageType::MapsListed,
                    &MapsListedPayload { maps },
                )?)?;
                Ok(())
            }
            MessageType::Chat => self.on_chat(&identity, &envelope).await,
            other => Err(RequestError::Protocol(format!("Unexpected message type {other}"))),
        }
    }

    // -- Connection ---------------------------------------------------------

    fn on_ping(&self, envelope: &Envelope) -> Result<(), RequestError> {
        let mut pong = Envelope::new(MessageType::Pong);
        pong.data = envelope.data.clone();
        self.reply(&pong)?;
        Ok(())
    }

    async fn on_connect(&mut self, envelope: &Envelope) -> Result<(), RequestError> {
        if let Some(identity) = &self.identity {
            // Already bound: answer again, ignore any other claimed ID.
            let info = self
                .state
                .sessions
                .get(&identity.session_id)
                .await
                .ok_or_else(|| RequestError::NotFound("Player not found".into()))?;
            return self.send_connected(&info, true).await;
        }

        let request: ConnectRequest = envelope.parse_data()?;
        let resolved = self
            .state
            .sessions
            .resolve(
                envelope.claimed_session(),
                request.player_name.as_deref(),
                self.handle.clone(),
            )
            .await;

        if let Some(previous) = resolved.replaced {
            tracing::info!(
                session_id = %resolved.session.session_id,
                old = %previous.id(),
                new = %self.handle.id(),
                "session moved to a new connection"
            );
            previous.send(self.state.frame(&Envelope::error("Session resumed on another connection"))?);
            previous.close();
        }

        let info = resolved.session;
        self.identity = Some(Identity {
            session_id: info.session_id.clone(),
            player_id: info.player_id,
            player_name: info.player_name.clone(),
        });
        self._detach = Some(DetachGuard {
            session_id: info.session_id.clone(),
            conn_id: self.handle.id(),
            sessions: Arc::clone(&self.state.sessions),
        });

        self.send_connected(&info, !resolved.is_new).await
    }

    /// Replies `CONNECTED`, then the current lobby snapshot if the
    /// session is seated somewhere.
    async fn send_connected(&self, info: &SessionInfo, reconnected: bool) -> Result<(), RequestError> {
        let lobby = self.state.lobbies.find_lobby_of_session(&info.session_id).await;
        let lobby_id = lobby.as_ref().map(|l| l.id());
        self.state.sessions.set_lobby(&info.session_id, lobby_id).await?;

        let payload = ConnectedPayload {
            session_id: info.session_id.clone(),
            player_id: info.player_id,
            player_name: info.player_name.clone(),
            reconnected,
            lobby_id,
        };
        self.reply(
            &Envelope::with_payload(MessageType::Connected, &payload)?
                .session(info.session_id.clone())
                .player(info.player_id),
        )?;

        if let Some(lobby) = lobby {
            let view = lobby.view().await;
            let mut update = Envelope::with_payload(MessageType::LobbyUpdated, &LobbyPayload { lobby: view.clone() })?;
            if let Some(game_id) = view.game_id {
                update = update.game(game_id);
            }
            self.reply(&update)?;
        }
        Ok(())
    }

    // -- Lobby lifecycle ----------------------------------------------------

    async fn on_create_lobby(&self, identity: &Identity, envelope: &Envelope) -> Result<(), RequestError> {
        let request: CreateLobbyRequest = envelope.parse_data()?;
        let name = request
            .lobby_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| RequestError::validation("Lobby name is required"))?;

        let lobby = self
            .state
            .lobbies
            .create(
                NewLobby {
                    name,
                    max_players: request.max_players,
                    password: request.password,
                    map_id: request.map_id,
                },
                identity.participant(),
            )
            .await?;
        self.state.sessions.set_lobby(&identity.session_id, Some(lobby.id())).await?;
        self.state.events.lobby_created(&lobby.summary().await);

        let view = lobby.view().await;
        self.reply(&Envelope::with_payload(
            MessageType::LobbyCreated,
            &LobbyPayload { lobby: view },
        )?)?;
        Ok(())
    }

    async fn on_join_lobby(&self, identity: &Identity, envelope: &Envelope) -> Result<(), RequestError> {
        let request: JoinLobbyRequest = envelope.parse_data()?;
        let lobby_id = request
            .lobby_id
            .ok_or_else(|| RequestError::validation("Lobby ID is required"))?;

        let (lobby, view) = self
            .state
            .lobbies
            .join(lobby_id, identity.participant(), request.password.as_deref())
            .await?;
        self.state.sessions.set_lobby(&identity.session_id, Some(lobby_id)).await?;

        self.reply(&Envelope::with_payload(
            MessageType::LobbyJoined,
            &LobbyPayload { lobby: view.clone() },
        )?)?;
        let others = others_in(&lobby, &identity.session_id).await;
        self.state.broadcast_lobby(&view, &others).await?;
        Ok(())
    }

    async fn on_leave_lobby(&self, identity: &Identity) -> Result<(), RequestError> {
        let departure = self.state.lobbies.leave(&identity.session_id).await?;
        self.state.sessions.set_lobby(&identity.session_id, None).await?;

        self.reply(&Envelope::with_payload(
            MessageType::LobbyLeft,
            &LobbyLeftPayload {
                lobby_id: departure.lobby_id,
            },
        )?)?;

        if !departure.deleted {
            if let Some(lobby) = self.state.lobbies.get(departure.lobby_id).await {
                let remaining = lobby.member_sessions().await;
                self.state.broadcast_lobby(&departure.removal.view, &remaining).await?;
            }
        }
        Ok(())
    }

    async fn on_set_ready(&self, identity: &Identity, envelope: &Envelope) -> Result<(), RequestError> {
        let request: SetReadyRequest = envelope.parse_data()?;
        let ready = request
            .ready
            .ok_or_else(|| RequestError::validation("Ready flag is required"))?;

        let lobby = self.lobby_of(identity).await?;
        let view = lobby.set_ready(&identity.session_id, ready).await?;
        let members = lobby.member_sessions().await;
        self.state.broadcast_lobby(&view, &members).await?;
        Ok(())
    }

    async fn on_start_game(&self, identity: &Identity) -> Result<(), RequestError> {
        let lobby = self.lobby_of(identity).await?;
        let ticket = self.state.lobbies.start_game(lobby.id(), &identity.session_id).await?;
        let lobby_id = ticket.lobby_id;

        let handed_off = self
            .state
            .handoff
            .start_game(lobby_id, &ticket.roster, ticket.map_id.as_deref())
            .await;

        let game = match handed_off {
            Ok(game) => game,
            Err(err) => {
                tracing::error!(%lobby_id, error = %err, "game handoff failed");
                let view = lobby.abort_start(&err.to_string()).await?;
                let members = lobby.member_sessions().await;
                self.state.broadcast_lobby(&view, &members).await?;
                return Err(err.into());
            }
        };

        lobby.mark_in_game(game.game_id.clone()).await?;
        self.state.events.game_started(lobby_id, &game.game_id, ticket.roster.len());
        tracing::info!(%lobby_id, game_id = %game.game_id, players = ticket.roster.len(), "game starting");

        let starting = Envelope::with_payload(
            MessageType::GameStarting,
            &GameStartingPayload {
                lobby_id,
                game_id: game.game_id.clone(),
                map_id: ticket.map_id,
                players: ticket.roster,
            },
        )?
        .game(game.game_id);
        self.state.send_to_sessions(&ticket.sessions, &starting).await?;
        Ok(())
    }

    // -- Chat ---------------------------------------------------------------

    async fn on_chat(&self, identity: &Identity, envelope: &Envelope) -> Result<(), RequestError> {
        let request: ChatRequest = envelope.parse_data()?;
        let text = request
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .ok_or_else(|| RequestError::validation("Message is required"))?;
        let max = self.state.lobbies.config().max_chat_len;
        if text.chars().count() > max {
            return Err(RequestError::validation(format!(
                "Message must be at most {max} characters"
            )));
        }

        let lobby = self.lobby_of(identity).await?;
        let message = lobby
            .add_message(&identity.session_id, text)
            .await
            .ok_or(LobbyError::NotInLobby)?;

        let chat = Envelope::with_payload(
            MessageType::Chat,
            &ChatPayload {
                lobby_id: lobby.id(),
                message,
            },
        )?;
        let members = lobby.member_sessions().await;
        self.state.send_to_sessions(&members, &chat).await?;
        Ok(())
    }

    async fn lobby_of(&self, identity: &Identity) -> Result<Arc<Lobby>, RequestError> {
        self.state
            .lobbies
            .find_lobby_of_session(&identity.session_id)
            .await
            .ok_or_else(|| LobbyError::NotInLobby.into())
    }
}

async fn others_in(lobby: &Lobby, session_id: &SessionId) -> Vec<SessionId> {
    let mut sessions = lobby.member_sessions().await;
    sessions.retain(|s| s != session_id);
    sessions
}
