//! Bounded outbound queues, one per connection.
//!
//! Anything that wants to talk to a client (the connection's own
//! dispatcher, a lobby broadcast, the admin shutdown notice) pushes an
//! encoded [`Frame`] into the connection's [`ConnectionHandle`]. A single
//! [`OutboxWriter`] task per connection drains the queue onto the socket.
//!
//! Pushing never waits. When a receiver falls `capacity` frames behind,
//! the [`OverflowPolicy`] decides whether the oldest frames are dropped or
//! the connection is cut, so one stalled client cannot stall a lobby.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_util::sync::CancellationToken;

use crate::{Connection, ConnectionId};

/// An encoded message ready to be written to the wire.
///
/// Reference-counted so one broadcast can be fanned out to many
/// connections without copying the payload.
pub type Frame = Arc<[u8]>;

/// What to do when a connection's outbound queue overflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Discard the oldest queued frames and keep going (logged).
    #[default]
    DropOldest,
    /// Close the connection. The session survives and the client can
    /// reconnect to get a fresh snapshot.
    Disconnect,
}

/// Outbound queue settings.
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    /// Maximum frames buffered per connection. Rounded up to a power of
    /// two by the underlying channel.
    pub capacity: usize,
    /// Overflow behavior.
    pub overflow: OverflowPolicy,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            overflow: OverflowPolicy::DropOldest,
        }
    }
}

/// Cheap, clonable sending side of a connection's outbox.
///
/// This is what the session layer stores as "the connection attached to
/// a session". Holding a handle does not keep the socket alive: once the
/// writer task is gone, [`send`](Self::send) simply returns `false`.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    frames: broadcast::Sender<Frame>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    /// The physical connection this handle writes to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues a frame. Returns `false` if the connection is closed.
    pub fn send(&self, frame: Frame) -> bool {
        if self.closed.is_cancelled() {
            return false;
        }
        self.frames.send(frame).is_ok()
    }

    /// Asks the writer to flush what is queued and close the socket.
    ///
    /// Idempotent. Also wakes the connection's read loop via
    /// [`closed`](Self::closed).
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Returns `true` once [`close`](Self::close) has been called or the
    /// writer has stopped.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves when the connection is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }
}

/// Receiving side of an outbox. Owned by exactly one writer task.
pub struct OutboxWriter {
    id: ConnectionId,
    frames: broadcast::Receiver<Frame>,
    closed: CancellationToken,
    overflow: OverflowPolicy,
}

/// Creates the outbox for one connection.
pub fn outbox(id: ConnectionId, config: &OutboxConfig) -> (ConnectionHandle, OutboxWriter) {
    let (tx, rx) = broadcast::channel(config.capacity.max(1));
    let closed = CancellationToken::new();
    let handle = ConnectionHandle {
        id,
        frames: tx,
        closed: closed.clone(),
    };
    let writer = OutboxWriter {
        id,
        frames: rx,
        closed,
        overflow: config.overflow,
    };
    (handle, writer)
}

impl OutboxWriter {
    /// Drains queued frames into `conn` until the handle is closed or a
    /// write fails, then closes the socket.
    ///
    /// Frames queued before [`ConnectionHandle::close`] are still flushed,
    /// so a final notice followed by a close reaches the client.
    pub async fn run<C: Connection>(mut self, conn: Arc<C>) {
        let id = self.id;
        loop {
            tokio::select! {
                biased;
                _ = self.closed.cancelled() => {
                    self.flush(conn.as_ref()).await;
                    break;
                }
                next = self.frames.recv() => match next {
                    Ok(frame) => {
                        if let Err(e) = conn.send(&frame).await {
                            tracing::debug!(conn_id = %id, error = %e, "outbound write failed");
                            self.closed.cancel();
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => match self.overflow {
                        OverflowPolicy::DropOldest => {
                            tracing::warn!(
                                conn_id = %id,
                                skipped,
                                "outbound queue overflow, dropped oldest frames"
                            );
                        }
                        OverflowPolicy::Disconnect => {
                            tracing::warn!(
                                conn_id = %id,
                                skipped,
                                "outbound queue overflow, disconnecting"
                            );
                            self.closed.cancel();
                            break;
                        }
                    },
                    Err(RecvError::Closed) => break,
                },
            }
        }

        self.closed.cancel();
        if let Err(e) = conn.close().await {
            tracing::trace!(conn_id = %id, error = %e, "close after writer exit");
        }
        tracing::debug!(conn_id = %id, "outbound writer stopped");
    }

    async fn flush<C: Connection>(&mut self, conn: &C) {
        loop {
            match self.frames.try_recv() {
                Ok(frame) => {
                    if conn.send(&frame).await.is_err() {
                        return;
                    }
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return,
            }
        }
    }
}
