//! Map catalog for Powerline.
//!
//! Boards are immutable: they are loaded and validated once at startup,
//! then shared read-only. Lobbies and the game engine refer to a board by
//! its ID and ask the [`MapCatalog`] for anything else.
//!
//! # Key types
//!
//! - [`MapData`] - one board: cities, connections, player bounds, rules
//! - [`MapCatalog`] - the loaded set, plus [`MapCatalog::shortest_path`]
//! - [`MapError`] - load/validation failures (fail-fast)

mod catalog;
mod error;
mod map;
mod path;

pub use catalog::MapCatalog;
pub use error::MapError;
pub use map::{
    City, CityLink, MapData, MapRules, PhaseTriggers, PlayerCount, Region, ResourceRules,
    WinConditions,
};
pub use path::Route;
