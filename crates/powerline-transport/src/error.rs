use std::io;
use std::net::SocketAddr;

/// Failures of the listener or of one socket.
///
/// Only [`Bind`](Self::Bind) is fatal to a server; everything else ends a
/// single connection or a single accept attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The OS refused to hand over the next TCP connection.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The HTTP upgrade was malformed or rejected.
    #[error("websocket upgrade from {peer} failed: {reason}")]
    Upgrade { peer: SocketAddr, reason: String },

    #[error("websocket upgrade from {0} timed out")]
    UpgradeTimeout(SocketAddr),

    /// The peer went away while a frame was being written.
    #[error("write to {conn} failed: {reason}")]
    Write { conn: crate::ConnectionId, reason: String },

    /// The socket errored while waiting for a frame.
    #[error("read from {conn} failed: {reason}")]
    Read { conn: crate::ConnectionId, reason: String },
}
