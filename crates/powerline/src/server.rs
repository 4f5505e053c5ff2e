//! `PowerlineServer` builder and server loop.
//!
//! This ties the layers together: transport → protocol → session →
//! lobby. Each accepted connection gets its own task; the sweeper runs
//! beside them.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use powerline_lobby::{LobbyConfig, LobbyManager};
use powerline_maps::MapCatalog;
use powerline_protocol::{
    Codec, Envelope, JsonCodec, LobbyPayload, LobbyView, MessageType, ProtocolError, SessionId,
};
use powerline_session::{SessionConfig, SessionRegistry};
use powerline_transport::{Frame, OutboxConfig, OverflowPolicy, Transport, WebSocketTransport};
use tokio_util::sync::CancellationToken;

use crate::handler::handle_connection;
use crate::sweeper::run_sweeper;
use crate::{
    AdminHandle, GameHandoff, LobbyEvents, LoggingHandoff, NoopEvents, PowerlineError, ServerConfig,
    SweepConfig,
};

/// Shared server state passed to each connection task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) sessions: Arc<SessionRegistry>,
    pub(crate) lobbies: Arc<LobbyManager>,
    pub(crate) codec: C,
    pub(crate) handoff: Arc<dyn GameHandoff>,
    pub(crate) events: Arc<dyn LobbyEvents>,
    pub(crate) config: ServerConfig,
}

impl<C: Codec> ServerState<C> {
    pub(crate) fn new(
        config: ServerConfig,
        catalog: Arc<MapCatalog>,
        codec: C,
        handoff: Arc<dyn GameHandoff>,
        events: Arc<dyn LobbyEvents>,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionRegistry::new(config.session.clone())),
            lobbies: Arc::new(LobbyManager::new(config.lobby.clone(), catalog)),
            codec,
            handoff,
            events,
            config,
        }
    }

    /// Encodes once for any number of recipients.
    pub(crate) fn frame(&self, envelope: &Envelope) -> Result<Frame, ProtocolError> {
        Ok(Frame::from(self.codec.encode(envelope)?))
    }

    /// Queues `envelope` on every attached connection among `sessions`.
    /// Returns how many connections it was queued on.
    pub(crate) async fn send_to_sessions(
        &self,
        sessions: &[SessionId],
        envelope: &Envelope,
    ) -> Result<usize, ProtocolError> {
        let frame = self.frame(envelope)?;
        let conns = self.sessions.connections_for(sessions).await;
        Ok(conns.iter().filter(|c| c.send(Frame::clone(&frame))).count())
    }

    /// Sends `LOBBY_UPDATED` with `view` to `sessions`.
    pub(crate) async fn broadcast_lobby(
        &self,
        view: &LobbyView,
        sessions: &[SessionId],
    ) -> Result<(), ProtocolError> {
        let mut envelope = Envelope::with_payload(
            MessageType::LobbyUpdated,
            &LobbyPayload { lobby: view.clone() },
        )?;
        if let Some(game_id) = &view.game_id {
            envelope = envelope.game(game_id.clone());
        }
        let sent = self.send_to_sessions(sessions, &envelope).await?;
        tracing::debug!(lobby_id = %view.lobby_id, revision = view.revision, sent, "lobby update broadcast");
        Ok(())
    }
}

/// Builder for configuring and starting a Powerline server.
///
/// # Example
///
/// ```rust,no_run
/// use powerline::prelude::*;
///
/// # async fn run() -> Result<(), PowerlineError> {
/// let server = PowerlineServer::builder()
///     .bind("0.0.0.0:8080")
///     .maps_dir("maps")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PowerlineServerBuilder {
    config: ServerConfig,
    catalog: Option<Arc<MapCatalog>>,
    handoff: Arc<dyn GameHandoff>,
    events: Arc<dyn LobbyEvents>,
}

impl PowerlineServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            catalog: None,
            handoff: Arc::new(LoggingHandoff),
            events: Arc::new(NoopEvents),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Loads maps from this directory at build time.
    pub fn maps_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.maps_dir = Some(dir.into());
        self
    }

    /// Uses an already-built catalog instead of reading `maps_dir`.
    pub fn catalog(mut self, catalog: MapCatalog) -> Self {
        self.catalog = Some(Arc::new(catalog));
        self
    }

    /// Session registry settings.
    ///
    /// `idle_timeout` is not taken from here: [`build`](Self::build)
    /// replaces it with the sweep idle threshold (see [`sweep`](Self::sweep)),
    /// so expiry and eviction always agree.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    pub fn lobby_config(mut self, config: LobbyConfig) -> Self {
        self.config.lobby = config;
        self
    }

    pub fn sweep_config(mut self, config: SweepConfig) -> Self {
        self.config.sweep = config;
        self
    }

    /// Sets the sweep interval and idle threshold together.
    pub fn sweep(mut self, scan_interval: Duration, idle_timeout: Duration) -> Self {
        self.config.sweep = SweepConfig {
            scan_interval,
            idle_timeout,
        };
        self
    }

    pub fn outbox(mut self, capacity: usize, overflow: OverflowPolicy) -> Self {
        self.config.outbox = OutboxConfig { capacity, overflow };
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Hands started lobbies to a game engine. Default: [`LoggingHandoff`].
    pub fn handoff(mut self, handoff: impl GameHandoff) -> Self {
        self.handoff = Arc::new(handoff);
        self
    }

    /// Installs an analytics hook. Default: [`NoopEvents`].
    pub fn events(mut self, events: impl LobbyEvents) -> Self {
        self.events = Arc::new(events);
        self
    }

    /// Loads the map catalog and binds the listener.
    ///
    /// The sweeper's idle threshold is also the session registry's
    /// expiry threshold, so a session the sweeper hasn't reached yet is
    /// still never re-attached once it has gone stale.
    pub async fn build(mut self) -> Result<PowerlineServer<JsonCodec>, PowerlineError> {
        self.config.validate()?;

        let catalog = match (self.catalog.take(), &self.config.maps_dir) {
            (Some(catalog), _) => catalog,
            (None, Some(dir)) => Arc::new(MapCatalog::load_all(dir)?),
            (None, None) => {
                tracing::warn!("no maps directory configured, lobbies will have no map");
                Arc::new(MapCatalog::empty())
            }
        };

        self.config.session.idle_timeout = self.config.sweep.idle_timeout;

        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let state = Arc::new(ServerState::new(
            self.config,
            catalog,
            JsonCodec,
            self.handoff,
            self.events,
        ));

        Ok(PowerlineServer {
            transport,
            state,
            shutdown: CancellationToken::new(),
        })
    }
}

impl Default for PowerlineServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Powerline server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PowerlineServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
    shutdown: CancellationToken,
}

impl PowerlineServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> PowerlineServerBuilder {
        PowerlineServerBuilder::new()
    }
}

impl<C> PowerlineServer<C>
where
    C: Codec + Clone,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle for operators: counters and the shutdown broadcast.
    pub fn admin(&self) -> AdminHandle<C> {
        AdminHandle::new(
            Arc::clone(&self.state.sessions),
            Arc::clone(&self.state.lobbies),
            self.state.codec.clone(),
        )
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), PowerlineError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `signal` resolves, then tells every
    /// attached client the server is going away.
    ///
    /// The loop only takes sockets off the listener. Each connection's
    /// WebSocket upgrade runs on its own task, so a peer that stalls
    /// mid-handshake delays nobody else. Accept failures are logged and
    /// the loop continues.
    pub async fn run_until(mut self, signal: impl Future<Output = ()>) -> Result<(), PowerlineError> {
        tracing::info!(
            addr = ?self.transport.local_addr().ok(),
            maps = self.state.lobbies.catalog().len(),
            "Powerline server running"
        );

        let sweeper = tokio::spawn(run_sweeper(Arc::clone(&self.state), self.shutdown.clone()));

        tokio::pin!(signal);
        loop {
            tokio::select! {
                _ = &mut signal => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(pending, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("shutting down");
        self.shutdown.cancel();
        let notified = self.admin().broadcast_shutdown("Server is shutting down").await?;
        tracing::info!(notified, "shutdown notice sent");
        if let Err(e) = sweeper.await {
            tracing::error!(error = %e, "sweeper task failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_takes_session_expiry_from_sweep() {
        let server = PowerlineServer::builder()
            .bind("127.0.0.1:0")
            .session_config(SessionConfig {
                idle_timeout: Duration::from_secs(1),
                ..SessionConfig::default()
            })
            .sweep(Duration::from_secs(30), Duration::from_secs(600))
            .build()
            .await
            .unwrap();

        assert_eq!(server.state.sessions.config().idle_timeout, Duration::from_secs(600));
        assert_eq!(server.state.sessions.config().max_name_len, 32);
    }
}
