//! Powerline lobby server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin powerline-server -- --maps-dir maps
//! cargo run --bin powerline-server -- --host 0.0.0.0 --port 9000 --idle-timeout-secs 600
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use powerline::prelude::*;
use powerline::{init_tracing, LoggingHandoff};

#[derive(Parser, Debug)]
#[command(name = "powerline-server")]
#[command(about = "Lobby and session server for a power-grid board game", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Directory of map JSON files
    #[arg(short = 'm', long)]
    maps_dir: Option<PathBuf>,

    /// Map used when a lobby doesn't pick one
    #[arg(long)]
    default_map: Option<String>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Seconds between idle-session sweeps
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..))]
    sweep_interval_secs: u64,

    /// Seconds a disconnected session is kept before it is evicted
    #[arg(long, default_value = "300")]
    idle_timeout_secs: u64,

    /// Seconds a new connection has to send CONNECT
    #[arg(long, default_value = "30")]
    connect_timeout_secs: u64,

    /// Outbound frames buffered per connection
    #[arg(long, default_value = "64")]
    outbox_capacity: usize,

    /// Disconnect slow clients instead of dropping their oldest frames
    #[arg(long)]
    disconnect_slow_clients: bool,
}

#[tokio::main]
async fn main() -> Result<(), PowerlineError> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let overflow = if args.disconnect_slow_clients {
        OverflowPolicy::Disconnect
    } else {
        OverflowPolicy::DropOldest
    };
    let lobby = LobbyConfig {
        default_map_id: args.default_map,
        ..LobbyConfig::default()
    };

    let mut builder = PowerlineServer::builder()
        .bind(&format!("{}:{}", args.host, args.port))
        .lobby_config(lobby)
        .sweep(
            Duration::from_secs(args.sweep_interval_secs),
            Duration::from_secs(args.idle_timeout_secs),
        )
        .connect_timeout(Duration::from_secs(args.connect_timeout_secs))
        .outbox(args.outbox_capacity, overflow)
        .handoff(LoggingHandoff);
    if let Some(dir) = args.maps_dir {
        builder = builder.maps_dir(dir);
    }

    let server = builder.build().await?;
    tracing::info!(addr = %args.host, port = args.port, "listening");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
