//! Error types for the gateway.
//!
//! [`GatewayError`] unifies every failure a request can hit and converts
//! into an Axum response with a JSON body `{"error": ..., "status": ...}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use fleetwatch_core::CoreError;

use crate::auth::AuthError;

/// Errors surfaced by REST handlers and the WebSocket upgrade.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Input was rejected before anything was written.
    #[error("{0}")]
    Validation(String),

    /// The credential was missing, malformed or expired.
    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    /// The caller's role may not perform the operation.
    #[error("{0}")]
    Forbidden(String),

    /// The referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The accident is durable but its alert could not be written.
    #[error("accident {accident_id} was recorded but its alert could not be created")]
    PartialReport {
        /// ID of the stored accident.
        accident_id: String,
    },

    /// A store or other internal failure.
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PartialReport { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for GatewayError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} {id} not found")),
            CoreError::PartialReport { accident, .. } => Self::PartialReport {
                accident_id: accident.id.to_string(),
            },
            CoreError::Store(e) => {
                tracing::error!(error = %e, "store failure");
                Self::Internal(String::from("storage unavailable"))
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });
        (status, axum::Json(body)).into_response()
    }
}
