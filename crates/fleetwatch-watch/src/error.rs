//! Error types for the realtime client.

use tokio_tungstenite::tungstenite;

/// Errors that end a watch session or the whole client.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// The gateway refused the credentials. Never retried.
    #[error("unauthorized: the gateway rejected the token")]
    Unauthorized,

    /// The connection could not be opened or broke.
    #[error("connection error: {0}")]
    Connection(#[from] tungstenite::Error),

    /// A frame could not be encoded.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Every reconnection attempt failed.
    #[error("gave up after {attempts} failed connection attempts")]
    GaveUp {
        /// Consecutive failures before giving up.
        attempts: u32,
    },
}
