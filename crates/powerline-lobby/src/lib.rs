//! Lobby lifecycle management for Powerline.
//!
//! A lobby is a pending game room: a roster of sessions with host and
//! ready flags, a message log, and a status. Every lobby serializes its
//! own mutations behind one lock; the [`LobbyManager`] owns the set of
//! lobbies behind a reader/writer lock.
//!
//! # Key types
//!
//! - [`Lobby`]: one room and its operations (join, leave, ready, start)
//! - [`LobbyManager`]: create/get/delete/list, and "which lobby is this
//!   session in"
//! - [`LobbyConfig`]: defaults and limits
//!
//! # Lock ordering
//!
//! Manager lock first, lobby lock second. Most manager operations clone
//! the `Arc<Lobby>` out and release the manager lock before touching the
//! lobby at all. Nothing takes the manager lock while holding a lobby lock.

mod config;
mod error;
mod lobby;
mod manager;

pub use config::LobbyConfig;
pub use error::LobbyError;
pub use lobby::{Lobby, Member, Participant, Removal, StartTicket};
pub use manager::{Departure, LobbyManager, NewLobby};
pub use powerline_protocol::LobbyStatus;
