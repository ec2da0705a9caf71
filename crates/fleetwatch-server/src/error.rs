//! Error types for the service binary.
//!
//! [`StartupError`] wraps every failure that can stop the service from
//! coming up or keep it from serving.

use fleetwatch_core::config::ConfigError;
use fleetwatch_db::DbError;
use fleetwatch_gateway::{AuthError, ServerError};
use fleetwatch_relay::RelayError;

/// Top-level error for the service binary.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The `PostgreSQL` store could not be opened or migrated.
    #[error("database error: {source}")]
    Database {
        /// The underlying database error.
        #[from]
        source: DbError,
    },

    /// The relay backend could not be reached.
    #[error("relay error: {source}")]
    Relay {
        /// The underlying relay error.
        #[from]
        source: RelayError,
    },

    /// Identity verification is not configured.
    #[error("auth error: {source}")]
    Auth {
        /// The underlying auth error.
        #[from]
        source: AuthError,
    },

    /// The gateway failed to bind or serve.
    #[error("gateway error: {source}")]
    Gateway {
        /// The underlying server error.
        #[from]
        source: ServerError,
    },
}
