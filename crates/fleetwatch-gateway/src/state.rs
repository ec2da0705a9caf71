//! Shared application state for the gateway.
//!
//! [`AppState`] bundles the core services, the identity provider and the
//! per-instance [`TopicRouter`]. It is wrapped in [`Arc`] and injected via
//! Axum's `State` extractor.

use std::sync::Arc;

use fleetwatch_core::{
    AlertPolicy, AlertService, Clock, EventSink, FleetConfig, FleetStore, IngestionService,
    VehicleQueries,
};

use crate::auth::IdentityProvider;
use crate::topics::TopicRouter;

/// Greeting sent in the `connected` frame.
pub const GREETING: &str = "Connected to Vehicle Monitoring System";

/// Tunables the handlers read per request.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySettings {
    /// Outbound queue size per WebSocket session.
    pub session_queue_capacity: usize,
    /// Default search radius for active-alert queries (m).
    pub alert_query_radius_m: f64,
    /// Allowed CORS origins; empty allows any.
    pub cors_origins: Vec<String>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            session_queue_capacity: 256,
            alert_query_radius_m: 5000.0,
            cors_origins: Vec::new(),
        }
    }
}

impl GatewaySettings {
    /// Read the settings from the loaded configuration.
    pub fn from_config(config: &FleetConfig) -> Self {
        Self {
            session_queue_capacity: config.server.session_queue_capacity,
            alert_query_radius_m: config.alerts.query_radius_m,
            cors_origins: config.server.cors_origins.clone(),
        }
    }
}

/// Shared state for the Axum application.
#[derive(Clone)]
pub struct AppState {
    /// Location ingestion and history.
    pub ingestion: IngestionService,
    /// Accident reporting and alert queries.
    pub alerts: AlertService,
    /// Vehicle lookups and radius searches.
    pub vehicles: VehicleQueries,
    /// Verifies bearer tokens.
    pub identity: Arc<dyn IdentityProvider>,
    /// Live session membership.
    pub topics: TopicRouter,
    /// Per-request tunables.
    pub settings: GatewaySettings,
}

impl AppState {
    /// Build the services over one store, sink and clock.
    pub fn new(
        store: Arc<dyn FleetStore>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        identity: Arc<dyn IdentityProvider>,
        config: &FleetConfig,
    ) -> Self {
        Self {
            ingestion: IngestionService::new(
                Arc::clone(&store),
                Arc::clone(&sink),
                Arc::clone(&clock),
            ),
            alerts: AlertService::new(
                Arc::clone(&store),
                sink,
                clock,
                AlertPolicy::from_config(&config.alerts),
            ),
            vehicles: VehicleQueries::new(store, config.alerts.nearby_radius_m),
            identity,
            topics: TopicRouter::new(),
            settings: GatewaySettings::from_config(config),
        }
    }
}
