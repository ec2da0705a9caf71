//! Core entity structs: vehicles, location samples, accidents, alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{AccidentStatus, AlertType, Role, Severity, VehicleStatus};
use crate::ids::{AccidentId, AlertId, IdentityId, SampleId, VehicleId};

/// Valid latitude range in degrees.
pub const LATITUDE_RANGE: core::ops::RangeInclusive<f64> = -90.0..=90.0;

/// Valid longitude range in degrees.
pub const LONGITUDE_RANGE: core::ops::RangeInclusive<f64> = -180.0..=180.0;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GeoPoint {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
}

impl GeoPoint {
    /// Build a point without validating it.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both coordinates are finite and inside the geodetic range.
    pub fn is_valid(&self) -> bool {
        LATITUDE_RANGE.contains(&self.latitude) && LONGITUDE_RANGE.contains(&self.longitude)
    }
}

/// A fleet vehicle and its latest-position projection.
///
/// `position`, `speed_kmh`, `heading` and `last_location_time` are derived:
/// they always hold the values of the last [`LocationSample`] applied to the
/// vehicle and are never edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Vehicle {
    /// Unique vehicle ID.
    pub id: VehicleId,
    /// License plate.
    pub registration_number: String,
    /// Manufacturer.
    pub make: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Model year.
    pub year: Option<i32>,
    /// Paint color.
    pub color: Option<String>,
    /// Assigned driver, if any.
    pub driver_id: Option<IdentityId>,
    /// Operational status.
    pub status: VehicleStatus,
    /// Last applied position; `None` until the first sample arrives.
    pub position: Option<GeoPoint>,
    /// Last applied speed in km/h.
    pub speed_kmh: f64,
    /// Last applied heading in degrees clockwise from north.
    pub heading: f64,
    /// Timestamp of the last applied sample.
    pub last_location_time: Option<DateTime<Utc>>,
}

impl Vehicle {
    /// Overwrite the projection with the values of `sample`.
    ///
    /// Last applied wins: no comparison against the previous timestamp is
    /// made.
    pub fn apply_sample(&mut self, sample: &LocationSample) {
        self.position = Some(sample.position);
        self.speed_kmh = sample.speed_kmh;
        self.heading = sample.heading;
        self.last_location_time = Some(sample.timestamp);
    }
}

/// One immutable position report in a vehicle's time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LocationSample {
    /// Unique sample ID.
    pub id: SampleId,
    /// Vehicle that reported the sample.
    pub vehicle_id: VehicleId,
    /// Reported position.
    pub position: GeoPoint,
    /// Speed in km/h.
    pub speed_kmh: f64,
    /// Heading in degrees clockwise from north.
    pub heading: f64,
    /// Altitude in meters.
    pub altitude_m: f64,
    /// Horizontal accuracy radius in meters.
    pub accuracy_m: f64,
    /// Server-assigned ingest time.
    pub timestamp: DateTime<Utc>,
}

/// A reported accident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Accident {
    /// Unique accident ID.
    pub id: AccidentId,
    /// Vehicle involved, when known.
    pub vehicle_id: Option<VehicleId>,
    /// Where it happened.
    pub position: GeoPoint,
    /// Reported severity.
    pub severity: Severity,
    /// Handling status.
    pub status: AccidentStatus,
    /// Classifier confidence in `[0, 1]` when detected automatically.
    pub ml_confidence: Option<f64>,
    /// Measured impact force (g) when available.
    pub impact_force: Option<f64>,
    /// Free-text description.
    pub description: Option<String>,
    /// When the accident was reported.
    pub reported_at: DateTime<Utc>,
}

/// An area alert broadcast to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Alert {
    /// Unique alert ID.
    pub id: AlertId,
    /// Kind of alert.
    pub alert_type: AlertType,
    /// Accident this alert was derived from.
    pub accident_id: Option<AccidentId>,
    /// Center of the alert area.
    pub position: GeoPoint,
    /// Radius of the alert area in meters.
    pub radius_m: f64,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Severity copied from the accident.
    pub severity: Severity,
    /// Manual on/off switch. Expiry is evaluated separately.
    pub active: bool,
    /// After this instant the alert is no longer active.
    pub expires_at: Option<DateTime<Utc>>,
    /// Principal who raised the alert.
    pub created_by: IdentityId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A verified principal as returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Identity {
    /// Principal ID.
    pub id: IdentityId,
    /// Login email.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Authorization role.
    pub role: Role,
}
