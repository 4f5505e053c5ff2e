//! Socket plumbing for the Powerline server.
//!
//! Nothing in here knows about players or lobbies. A [`Transport`] hands
//! out [`Connection`]s that move opaque byte frames, and every connection
//! gets an [`outbox`]: a bounded queue drained by its own writer task, so
//! a broadcast never waits on a slow client.
//!
//! The `websocket` feature (on by default) provides the
//! `tokio-tungstenite` implementation browser clients talk to.

#![allow(async_fn_in_trait)]

mod error;
mod outbox;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use outbox::{
    outbox, ConnectionHandle, Frame, OutboxConfig, OutboxWriter, OverflowPolicy,
};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport, WebSocketUpgrade};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Names one physical socket.
///
/// Unique within the process and never reused. It is not a player
/// identity: a session moves between connections as its player
/// reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw value. Transports use [`next`](Self::next) instead.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Allocates the next process-wide ID.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A listener producing connections.
///
/// Accepting and establishing are separate steps. `accept` only takes the
/// next socket off the listener; the protocol handshake happens in
/// [`Handshake::establish`], which callers run on the connection's own
/// task so a peer that stalls mid-handshake holds up nobody else.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Pending: Handshake<Connection = Self::Connection, Error = Self::Error>;
    type Error: std::error::Error + Send + Sync;

    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;
}

/// An accepted socket that hasn't finished its handshake yet.
pub trait Handshake: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Completes the handshake, bounded by the transport's own timeout.
    async fn establish(self) -> Result<Self::Connection, Self::Error>;
}

/// One bidirectional frame stream.
///
/// `send` and `recv` take `&self` because two tasks use a connection at
/// once: the dispatcher parks in `recv` while the outbox writer calls
/// `send`.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    async fn send(&self, frame: &[u8]) -> Result<(), Self::Error>;

    /// The next inbound frame, or `Ok(None)` once the peer has closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_displays_with_prefix() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
        assert_eq!(ConnectionId::new(7).get(), 7);
    }

    #[test]
    fn test_connection_id_next_is_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }
}
