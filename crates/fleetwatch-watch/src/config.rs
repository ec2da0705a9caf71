//! Client configuration loaded from arguments and the environment.

use std::time::Duration;

use crate::error::WatchError;

/// Gateway URL used when none is given.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:5000/ws";

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// WebSocket endpoint of the gateway.
    pub url: String,
    /// Bearer token presented on connect.
    pub token: String,
    /// Consecutive failed attempts before giving up.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl WatchConfig {
    /// Build the configuration.
    ///
    /// The first argument, if any, is the gateway URL; otherwise
    /// `FLEETWATCH_URL` or [`DEFAULT_URL`].
    ///
    /// Environment variables:
    /// - `FLEETWATCH_TOKEN` -- bearer token (required)
    /// - `FLEETWATCH_URL` -- gateway URL
    /// - `RECONNECT_ATTEMPTS` -- consecutive failures tolerated (default 5)
    /// - `RECONNECT_DELAY_MS` -- delay between attempts (default 1000)
    pub fn from_env(mut args: impl Iterator<Item = String>) -> Result<Self, WatchError> {
        let url = args
            .next()
            .or_else(|| std::env::var("FLEETWATCH_URL").ok())
            .unwrap_or_else(|| DEFAULT_URL.to_owned());

        let token = std::env::var("FLEETWATCH_TOKEN")
            .map_err(|e| WatchError::Config(format!("FLEETWATCH_TOKEN: {e}")))?;

        let max_attempts: u32 = std::env::var("RECONNECT_ATTEMPTS")
            .unwrap_or_else(|_| "5".to_owned())
            .parse()
            .map_err(|e| WatchError::Config(format!("invalid RECONNECT_ATTEMPTS: {e}")))?;

        let delay_ms: u64 = std::env::var("RECONNECT_DELAY_MS")
            .unwrap_or_else(|_| "1000".to_owned())
            .parse()
            .map_err(|e| WatchError::Config(format!("invalid RECONNECT_DELAY_MS: {e}")))?;

        Self::new(url, token, max_attempts, Duration::from_millis(delay_ms))
    }

    /// Build and check a configuration.
    pub fn new(
        url: String,
        token: String,
        max_attempts: u32,
        backoff: Duration,
    ) -> Result<Self, WatchError> {
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(WatchError::Config(format!(
                "gateway URL must use ws:// or wss://, got {url}"
            )));
        }
        if token.trim().is_empty() {
            return Err(WatchError::Config(String::from("token is empty")));
        }
        if max_attempts == 0 {
            return Err(WatchError::Config(String::from(
                "RECONNECT_ATTEMPTS must be at least 1",
            )));
        }
        Ok(Self {
            url,
            token,
            max_attempts,
            backoff,
        })
    }
}
