//! # Powerline
//!
//! Lobby and session coordination server for a turn-based power-grid
//! board game.
//!
//! Players connect over WebSocket, get a durable session that survives
//! reconnects, and gather in lobbies. When a host starts a lobby the
//! roster is handed to a game engine through [`GameHandoff`]. Idle
//! sessions are swept after a configurable timeout.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use powerline::prelude::*;
//!
//! # async fn run() -> Result<(), PowerlineError> {
//! let server = PowerlineServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .maps_dir("maps")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod admin;
mod config;
mod error;
mod handler;
mod handoff;
mod logging;
mod server;
mod sweeper;

pub use admin::{AdminHandle, ServerStats};
pub use config::{ServerConfig, SweepConfig};
pub use error::{PowerlineError, RequestError};
pub use handoff::{GameHandle, GameHandoff, HandoffError, LobbyEvents, LoggingHandoff, NoopEvents};
pub use logging::init_tracing;
pub use server::{PowerlineServer, PowerlineServerBuilder};
pub use sweeper::SweepReport;

/// Re-exports for embedding the server.
pub mod prelude {
    pub use crate::{
        AdminHandle, GameHandle, GameHandoff, HandoffError, LobbyEvents, PowerlineError,
        PowerlineServer, PowerlineServerBuilder, ServerConfig, SweepConfig,
    };
    pub use powerline_lobby::LobbyConfig;
    pub use powerline_maps::MapCatalog;
    pub use powerline_protocol::{
        Envelope, LobbyId, LobbyStatus, LobbySummary, MessageType, PlayerId, RosterEntry, SessionId,
    };
    pub use powerline_session::SessionConfig;
    pub use powerline_transport::{OutboxConfig, OverflowPolicy};
}
