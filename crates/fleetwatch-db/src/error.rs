//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`], which converts into the core
//! [`StoreError`] at the [`FleetStore`](fleetwatch_core::FleetStore) seam.

use fleetwatch_core::StoreError;
use fleetwatch_types::UnknownVariant;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored enum column held an unexpected value.
    #[error("Decode error: {0}")]
    Decode(#[from] UnknownVariant),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        Self::Backend(Box::new(err))
    }
}
