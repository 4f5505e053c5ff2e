//! Tracing subscriber setup for the server binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a formatted subscriber filtered by `RUST_LOG`, falling back
/// to `default_level` for this server's own crates.
///
/// Does nothing if a global subscriber is already set, so tests and
/// embedders can install their own.
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        [
            "powerline",
            "powerline_server",
            "powerline_transport",
            "powerline_protocol",
            "powerline_maps",
            "powerline_session",
            "powerline_lobby",
        ]
        .iter()
        .map(|target| format!("{target}={default_level}"))
        .collect::<Vec<_>>()
        .join(",")
        .into()
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
