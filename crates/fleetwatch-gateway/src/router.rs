//! Axum router construction.
//!
//! Assembles the REST routes and the WebSocket upgrade into one [`Router`]
//! with CORS and request tracing.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::session;
use crate::state::AppState;

fn cors(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Build the complete router for the gateway.
///
/// `settings.cors_origins` restricts cross-origin access; an empty list
/// allows any origin.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors(&state.settings.cors_origins);

    Router::new()
        .route("/health", get(handlers::health))
        // Realtime
        .route("/ws", get(session::ws_session))
        // Vehicles
        .route("/api/vehicles", get(handlers::list_vehicles))
        .route("/api/vehicles/nearby", get(handlers::nearby_vehicles))
        .route("/api/vehicles/{id}", get(handlers::get_vehicle))
        .route("/api/vehicles/{id}/location", post(handlers::post_location))
        .route("/api/vehicles/{id}/history", get(handlers::location_history))
        // Accidents and alerts
        .route(
            "/api/accidents",
            get(handlers::list_accidents).post(handlers::report_accident),
        )
        .route("/api/accidents/alerts", get(handlers::active_alerts))
        .route("/api/alerts/{id}/deactivate", post(handlers::deactivate_alert))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
