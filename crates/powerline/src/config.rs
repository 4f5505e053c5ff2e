//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use powerline_lobby::LobbyConfig;
use powerline_session::SessionConfig;
use powerline_transport::OutboxConfig;

use crate::PowerlineError;

/// Timers of the idle-session sweeper.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between sweeps. Default: 60 seconds.
    pub scan_interval: Duration,

    /// How long a detached session may stay silent before it is evicted
    /// and removed from its lobby. Default: 5 minutes.
    pub idle_timeout: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on. Default: `127.0.0.1:8080`.
    pub bind_addr: String,

    /// Directory of `*.json` map files. `None` runs with no maps.
    pub maps_dir: Option<PathBuf>,

    /// How long a connection may stay open without sending `CONNECT`.
    /// Default: 30 seconds.
    pub connect_timeout: Duration,

    /// Close an identified connection after this long without a frame.
    /// `None` (the default) never times out; the sweeper handles
    /// abandoned sessions once their socket is gone.
    pub read_timeout: Option<Duration>,

    pub session: SessionConfig,
    pub lobby: LobbyConfig,
    pub sweep: SweepConfig,
    pub outbox: OutboxConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            maps_dir: None,
            connect_timeout: Duration::from_secs(30),
            read_timeout: None,
            session: SessionConfig::default(),
            lobby: LobbyConfig::default(),
            sweep: SweepConfig::default(),
            outbox: OutboxConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Rejects settings the server can't run with.
    pub fn validate(&self) -> Result<(), PowerlineError> {
        if self.sweep.scan_interval.is_zero() {
            return Err(PowerlineError::Config("sweep interval must be greater than zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert!(config.read_timeout.is_none());
        assert_eq!(config.sweep.scan_interval, Duration::from_secs(60));
        assert_eq!(config.sweep.idle_timeout, config.session.idle_timeout);
        assert_eq!(config.outbox.capacity, 64);
    }

    #[test]
    fn test_validate_rejects_zero_scan_interval() {
        let mut config = ServerConfig::default();
        assert!(config.validate().is_ok());

        config.sweep.scan_interval = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PowerlineError::Config(_)));
        assert_eq!(err.to_string(), "invalid configuration: sweep interval must be greater than zero");
    }
}
