//! Error types for the map catalog.

use std::path::PathBuf;

/// Errors that can occur while loading or validating maps.
///
/// Loading is all-or-nothing: the first error aborts the whole load.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// A map file or the map directory could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A map file is not valid JSON for a map definition.
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A map parsed but violates a structural rule.
    #[error("map '{map_id}' is invalid: {reason}")]
    Invalid { map_id: String, reason: String },

    /// Two maps share an ID.
    #[error("duplicate map id '{0}'")]
    Duplicate(String),
}

impl MapError {
    pub(crate) fn invalid(map_id: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            map_id: map_id.to_owned(),
            reason: reason.into(),
        }
    }
}
