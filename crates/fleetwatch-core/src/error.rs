//! Error types for the core services and the store seam.

use fleetwatch_types::Accident;

/// Errors returned by a [`FleetStore`](crate::store::FleetStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind, e.g. `"vehicle"`.
        entity: &'static str,
        /// The missing ID.
        id: String,
    },

    /// An entity with the same unique key already exists.
    #[error("{entity} {key} already exists")]
    Conflict {
        /// Entity kind.
        entity: &'static str,
        /// The duplicated key.
        key: String,
    },

    /// The backend failed (connection, query, decoding).
    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Shorthand for [`StoreError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Errors surfaced by the ingestion and alert services.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Input was rejected before anything was written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist; nothing was written.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// The missing ID.
        id: String,
    },

    /// The store failed.
    #[error("store error: {0}")]
    Store(#[source] StoreError),

    /// The accident was stored but its alert was not.
    ///
    /// Carries the durable accident so callers can reconcile it.
    #[error("accident {} stored but alert creation failed: {source}", accident.id)]
    PartialReport {
        /// The accident that was written.
        accident: Box<Accident>,
        /// Why the alert insert failed.
        source: StoreError,
    },
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Store(other),
        }
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
