//! Alert lifecycle manager.
//!
//! Reporting an accident writes the accident, then the alert derived from it,
//! then notifies the relay. The two writes are not transactional: if the
//! alert insert fails the accident stays behind and the caller receives
//! [`CoreError::PartialReport`] carrying it. No event is published in that
//! case.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info};
use validator::Validate;

use fleetwatch_types::{
    Accident, AccidentId, AccidentNotice, AccidentStatus, Alert, AlertId, GeoPoint, IdentityId,
    RelayEvent, Severity, VehicleId,
};

use crate::alert::{ActiveAlert, AlertPolicy, Proximity};
use crate::clock::Clock;
use crate::error::CoreError;
use crate::sink::EventSink;
use crate::spatial::{validate_point, validate_radius};
use crate::store::{AccidentFilter, FleetStore};

/// An accident report as submitted by a driver or a detector.
///
/// Multi-word fields accept both `snake_case` and `camelCase` keys. Unknown
/// keys are rejected so a misspelled field cannot be dropped silently.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AccidentReport {
    /// Vehicle involved, when known.
    #[serde(alias = "vehicleId")]
    pub vehicle_id: Option<VehicleId>,
    /// Latitude in degrees.
    #[validate(required, range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    /// Longitude in degrees.
    #[validate(required, range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    /// Severity; `moderate` when omitted.
    pub severity: Option<Severity>,
    /// Classifier confidence.
    #[serde(alias = "mlConfidence")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub ml_confidence: Option<f64>,
    /// Measured impact force.
    #[serde(alias = "impactForce")]
    #[validate(range(min = 0.0))]
    pub impact_force: Option<f64>,
    /// Free-text description.
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// Alert radius override in meters.
    #[serde(alias = "alertRadiusM")]
    #[validate(range(min = 0.0))]
    pub alert_radius_m: Option<f64>,
    /// Alert lifetime override in seconds.
    #[serde(alias = "alertTtlSecs")]
    #[validate(range(min = 1))]
    pub alert_ttl_secs: Option<u64>,
}

impl AccidentReport {
    /// Report with only a position and severity.
    pub const fn at(latitude: f64, longitude: f64, severity: Severity) -> Self {
        Self {
            vehicle_id: None,
            latitude: Some(latitude),
            longitude: Some(longitude),
            severity: Some(severity),
            ml_confidence: None,
            impact_force: None,
            description: None,
            alert_radius_m: None,
            alert_ttl_secs: None,
        }
    }

    fn point(&self) -> Result<GeoPoint, CoreError> {
        self.validate()?;
        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
            return Err(CoreError::Validation(
                "latitude and longitude are required".to_owned(),
            ));
        };
        if let Some(radius) = self.alert_radius_m {
            validate_radius(radius)?;
        }
        for (field, value) in [
            ("ml_confidence", self.ml_confidence),
            ("impact_force", self.impact_force),
        ] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(CoreError::Validation(format!("{field} must be finite")));
            }
        }
        validate_point(GeoPoint::new(latitude, longitude))
    }
}

/// Result of a successful accident report.
#[derive(Debug, Clone, PartialEq)]
pub struct AccidentReported {
    /// The stored accident.
    pub accident: Accident,
    /// The alert derived from it.
    pub alert: Alert,
}

/// Creates, queries and deactivates alerts.
#[derive(Clone)]
pub struct AlertService {
    store: Arc<dyn FleetStore>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    policy: AlertPolicy,
}

impl AlertService {
    /// Create the service with the given default policy.
    pub fn new(
        store: Arc<dyn FleetStore>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        policy: AlertPolicy,
    ) -> Self {
        Self {
            store,
            sink,
            clock,
            policy,
        }
    }

    /// Store an accident and its alert, then notify the relay.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] if the report is malformed
    /// - [`CoreError::NotFound`] if `vehicle_id` names an unknown vehicle
    /// - [`CoreError::Store`] if the accident insert fails
    /// - [`CoreError::PartialReport`] if the alert insert fails
    pub async fn report_accident(
        &self,
        report: AccidentReport,
        reporter: IdentityId,
    ) -> Result<AccidentReported, CoreError> {
        let position = report.point()?;

        if let Some(vehicle_id) = report.vehicle_id {
            if self.store.get_vehicle(vehicle_id).await?.is_none() {
                return Err(CoreError::NotFound {
                    entity: "vehicle",
                    id: vehicle_id.to_string(),
                });
            }
        }

        let now = self.clock.now();
        let policy = self
            .policy
            .with_overrides(report.alert_radius_m, report.alert_ttl_secs);

        let accident = self
            .store
            .insert_accident(Accident {
                id: AccidentId::new(),
                vehicle_id: report.vehicle_id,
                position,
                severity: report.severity.unwrap_or_default(),
                status: AccidentStatus::Reported,
                ml_confidence: report.ml_confidence,
                impact_force: report.impact_force,
                description: report.description,
                reported_at: now,
            })
            .await?;

        let alert = match self
            .store
            .insert_alert(policy.derive(&accident, reporter, now))
            .await
        {
            Ok(alert) => alert,
            Err(source) => {
                error!(
                    accident_id = %accident.id,
                    error = %source,
                    "accident stored without an alert"
                );
                return Err(CoreError::PartialReport {
                    accident: Box::new(accident),
                    source,
                });
            }
        };

        info!(
            accident_id = %accident.id,
            alert_id = %alert.id,
            severity = %accident.severity,
            radius_m = alert.radius_m,
            reporter = %reporter,
            "accident reported"
        );

        self.sink
            .publish(RelayEvent::AccidentReported(AccidentNotice::new(&accident, &alert)));

        Ok(AccidentReported { accident, alert })
    }

    /// Alerts active now, optionally filtered by proximity.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] for an invalid point or radius
    /// - [`CoreError::Store`] if the read fails
    pub async fn active_alerts(
        &self,
        proximity: Option<Proximity>,
    ) -> Result<Vec<ActiveAlert>, CoreError> {
        match proximity {
            Some(Proximity::Within { center, radius_m }) => {
                validate_point(center)?;
                validate_radius(radius_m)?;
            }
            Some(Proximity::Covering { point }) => {
                validate_point(point)?;
            }
            None => {}
        }
        Ok(self.store.active_alerts(self.clock.now(), proximity).await?)
    }

    /// Switch an alert off regardless of its expiry.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the alert does not exist
    /// - [`CoreError::Store`] if the write fails
    pub async fn deactivate(&self, id: AlertId) -> Result<Alert, CoreError> {
        let alert = self.store.deactivate_alert(id).await?;
        info!(alert_id = %id, "alert deactivated");
        Ok(alert)
    }

    /// Accidents, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Store`] if the read fails.
    pub async fn list_accidents(&self, filter: AccidentFilter) -> Result<Vec<Accident>, CoreError> {
        Ok(self.store.list_accidents(filter).await?)
    }
}
