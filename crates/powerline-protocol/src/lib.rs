//! Wire protocol for Powerline.
//!
//! This crate defines what clients and the lobby server say to each other:
//!
//! - **Types** ([`Envelope`], [`MessageType`], identity newtypes) - the
//!   outer frame every message travels in.
//! - **Payloads** ([`CreateLobbyRequest`], [`LobbyView`], ...) - the typed
//!   contents of an envelope's `data` field, one shape per message type.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) - how envelopes become
//!   bytes and back.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session (player identity)
//! ```

mod codec;
mod error;
mod payload;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use payload::{
    ChatPayload, ChatRequest, ConnectRequest, ConnectedPayload, CreateLobbyRequest,
    ErrorPayload, GameStartingPayload, JoinLobbyRequest, LobbiesListedPayload,
    LobbyLeftPayload, LobbyMessage, LobbyPayload, LobbySummary, LobbyView, MapSummary,
    MapsListedPayload, MemberView, MessageKind, RosterEntry, SetReadyRequest,
    ShutdownPayload,
};
pub use types::{Envelope, LobbyId, LobbyStatus, MessageType, PlayerId, SessionId};
