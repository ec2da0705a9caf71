//! Location ingestion.
//!
//! A report is validated, stamped with the server clock, appended to the
//! vehicle's time series together with the projection update, and then
//! handed to the [`EventSink`]. Rejected reports mutate nothing and publish
//! nothing.

use std::sync::Arc;

use chrono::Duration;
use serde::Deserialize;
use tracing::{debug, info};
use validator::Validate;

use fleetwatch_types::{
    GeoPoint, LocationSample, LocationUpdate, RelayEvent, SampleId, Vehicle, VehicleId,
};

use crate::clock::Clock;
use crate::error::CoreError;
use crate::sink::EventSink;
use crate::spatial::validate_point;
use crate::store::FleetStore;

/// Speed assumed when a report omits it (km/h).
pub const DEFAULT_SPEED_KMH: f64 = 0.0;
/// Heading assumed when a report omits it (degrees).
pub const DEFAULT_HEADING: f64 = 0.0;
/// Altitude assumed when a report omits it (m).
pub const DEFAULT_ALTITUDE_M: f64 = 0.0;
/// Accuracy assumed when a report omits it (m).
pub const DEFAULT_ACCURACY_M: f64 = 10.0;
/// History window when none is requested.
pub const DEFAULT_HISTORY_HOURS: u32 = 24;
/// History page size when none is requested.
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

/// A position report as submitted by a vehicle.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
pub struct LocationReport {
    /// Latitude in degrees.
    #[validate(required, range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    /// Longitude in degrees.
    #[validate(required, range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    /// Speed in km/h.
    #[validate(range(min = 0.0))]
    pub speed: Option<f64>,
    /// Heading in degrees.
    #[validate(range(min = 0.0, max = 360.0))]
    pub heading: Option<f64>,
    /// Altitude in meters.
    pub altitude: Option<f64>,
    /// Horizontal accuracy in meters.
    #[validate(range(min = 0.0))]
    pub accuracy: Option<f64>,
}

impl LocationReport {
    /// Report with only a position.
    pub const fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            speed: None,
            heading: None,
            altitude: None,
            accuracy: None,
        }
    }

    /// Validate and resolve the position.
    fn point(&self) -> Result<GeoPoint, CoreError> {
        self.validate()?;
        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
            return Err(CoreError::Validation(
                "latitude and longitude are required".to_owned(),
            ));
        };
        for (field, value) in [
            ("speed", self.speed),
            ("heading", self.heading),
            ("altitude", self.altitude),
            ("accuracy", self.accuracy),
        ] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(CoreError::Validation(format!("{field} must be finite")));
            }
        }
        validate_point(GeoPoint::new(latitude, longitude))
    }
}

/// Result of a successful ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecorded {
    /// The appended sample.
    pub sample: LocationSample,
    /// The vehicle with its projection updated.
    pub vehicle: Vehicle,
}

/// Validates and records location samples.
#[derive(Clone)]
pub struct IngestionService {
    store: Arc<dyn FleetStore>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl IngestionService {
    /// Create the service.
    pub fn new(store: Arc<dyn FleetStore>, sink: Arc<dyn EventSink>, clock: Arc<dyn Clock>) -> Self {
        Self { store, sink, clock }
    }

    /// Record one position report for `vehicle_id`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] if the report is malformed
    /// - [`CoreError::NotFound`] if the vehicle does not exist
    /// - [`CoreError::Store`] if the write fails
    pub async fn ingest(
        &self,
        vehicle_id: VehicleId,
        report: &LocationReport,
    ) -> Result<SampleRecorded, CoreError> {
        let position = report.point()?;

        let sample = LocationSample {
            id: SampleId::new(),
            vehicle_id,
            position,
            speed_kmh: report.speed.unwrap_or(DEFAULT_SPEED_KMH),
            heading: report.heading.unwrap_or(DEFAULT_HEADING),
            altitude_m: report.altitude.unwrap_or(DEFAULT_ALTITUDE_M),
            accuracy_m: report.accuracy.unwrap_or(DEFAULT_ACCURACY_M),
            timestamp: self.clock.now(),
        };

        let vehicle = self.store.record_sample(sample.clone()).await?;

        debug!(
            vehicle_id = %vehicle_id,
            latitude = position.latitude,
            longitude = position.longitude,
            speed_kmh = sample.speed_kmh,
            "location sample recorded"
        );

        self.sink
            .publish(RelayEvent::LocationUpdated(LocationUpdate::from(&sample)));

        Ok(SampleRecorded { sample, vehicle })
    }

    /// Samples of one vehicle within the last `hours`, newest first.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the vehicle does not exist
    /// - [`CoreError::Store`] if the read fails
    pub async fn history(
        &self,
        vehicle_id: VehicleId,
        hours: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Vec<LocationSample>, CoreError> {
        let hours = hours.unwrap_or(DEFAULT_HISTORY_HOURS);
        let since = self
            .clock
            .now()
            .checked_sub_signed(Duration::hours(i64::from(hours)))
            .unwrap_or(chrono::DateTime::UNIX_EPOCH);
        let samples = self
            .store
            .location_history(vehicle_id, since, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .await?;
        info!(vehicle_id = %vehicle_id, hours, count = samples.len(), "history served");
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_coordinates_are_rejected() {
        let report = LocationReport {
            latitude: Some(12.9),
            ..LocationReport::default()
        };
        assert!(matches!(report.point(), Err(CoreError::Validation(_))));
    }

    #[test]
    fn zero_coordinates_are_valid() {
        assert!(LocationReport::at(0.0, 0.0).point().is_ok());
    }

    #[test]
    fn out_of_range_and_non_finite_are_rejected() {
        assert!(LocationReport::at(90.1, 0.0).point().is_err());
        assert!(LocationReport::at(0.0, 180.5).point().is_err());
        assert!(LocationReport::at(f64::NAN, 0.0).point().is_err());

        let mut report = LocationReport::at(12.9, 77.6);
        report.heading = Some(361.0);
        assert!(report.point().is_err());

        report.heading = Some(90.0);
        report.speed = Some(-1.0);
        assert!(report.point().is_err());

        report.speed = Some(f64::INFINITY);
        assert!(report.point().is_err());
    }
}
