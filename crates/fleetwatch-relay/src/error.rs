//! Error types for the relay layer.

/// Errors that can occur while publishing to or subscribing on a relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A Redis operation failed.
    #[error("Redis error: {0}")]
    Redis(#[from] fred::error::Error),

    /// A NATS operation failed.
    #[error("NATS error: {0}")]
    Nats(String),

    /// An event could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
