//! Player session management for Powerline.
//!
//! A session is a player's identity on the server. It outlives any one
//! WebSocket: a client that drops and reconnects presents its session ID
//! and gets the same player ID and lobby membership back.
//!
//! ```text
//! Lobby Layer (above)        ← references sessions by SessionId only
//!     ↕
//! Session Layer (this crate) ← identity, attached connection, idle clock
//!     ↕
//! Transport / Protocol       ← ConnectionHandle, SessionId, PlayerId
//! ```
//!
//! Only the sweeper deletes sessions. Closing a connection merely
//! detaches it and starts the idle clock.

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::{Resolved, SessionRegistry};
pub use session::{SessionConfig, SessionInfo, SessionState};
