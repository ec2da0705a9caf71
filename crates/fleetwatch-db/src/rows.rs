//! Database row types and their conversion into domain types.
//!
//! Points are read back as `ST_Y`/`ST_X` of the geography cast to geometry,
//! i.e. latitude and longitude in degrees.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use fleetwatch_types::{Accident, Alert, GeoPoint, LocationSample, Vehicle};

use crate::error::DbError;

/// Column list for vehicle selects.
pub(crate) const VEHICLE_COLUMNS: &str = "id, registration_number, make, model, year, color, \
     driver_id, status, ST_Y(last_location::geometry) AS latitude, \
     ST_X(last_location::geometry) AS longitude, speed_kmh, heading, last_location_time";

/// Column list for location sample selects.
pub(crate) const SAMPLE_COLUMNS: &str = "id, vehicle_id, ST_Y(location::geometry) AS latitude, \
     ST_X(location::geometry) AS longitude, speed_kmh, heading, altitude_m, accuracy_m, timestamp";

/// Column list for accident selects.
pub(crate) const ACCIDENT_COLUMNS: &str = "id, vehicle_id, ST_Y(location::geometry) AS latitude, \
     ST_X(location::geometry) AS longitude, severity, status, ml_confidence, impact_force, \
     description, reported_at";

/// Column list for alert selects.
pub(crate) const ALERT_COLUMNS: &str = "id, alert_type, accident_id, \
     ST_Y(location::geometry) AS latitude, ST_X(location::geometry) AS longitude, radius_m, \
     title, message, severity, active, expires_at, created_by, created_at";

/// A row from the `vehicles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VehicleRow {
    /// Vehicle ID.
    pub id: Uuid,
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
    /// Assigned driver.
    pub driver_id: Option<Uuid>,
    /// Status as text.
    pub status: String,
    /// Projected latitude.
    pub latitude: Option<f64>,
    /// Projected longitude.
    pub longitude: Option<f64>,
    /// Projected speed.
    pub speed_kmh: f64,
    /// Projected heading.
    pub heading: f64,
    /// Time of the last applied sample.
    pub last_location_time: Option<DateTime<Utc>>,
}

impl TryFrom<VehicleRow> for Vehicle {
    type Error = DbError;

    fn try_from(row: VehicleRow) -> Result<Self, DbError> {
        Ok(Self {
            id: row.id.into(),
            registration_number: row.registration_number,
            make: row.make,
            model: row.model,
            year: row.year,
            color: row.color,
            driver_id: row.driver_id.map(Into::into),
            status: row.status.parse()?,
            position: row
                .latitude
                .zip(row.longitude)
                .map(|(lat, lon)| GeoPoint::new(lat, lon)),
            speed_kmh: row.speed_kmh,
            heading: row.heading,
            last_location_time: row.last_location_time,
        })
    }
}

/// A vehicle row with its distance from a query point.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RankedVehicleRow {
    /// The vehicle columns.
    #[sqlx(flatten)]
    pub vehicle: VehicleRow,
    /// Geodesic distance in meters.
    pub distance_m: f64,
}

/// A row from the `locations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SampleRow {
    /// Sample ID.
    pub id: Uuid,
    /// Reporting vehicle.
    pub vehicle_id: Uuid,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Speed.
    pub speed_kmh: f64,
    /// Heading.
    pub heading: f64,
    /// Altitude.
    pub altitude_m: f64,
    /// Accuracy.
    pub accuracy_m: f64,
    /// Ingest time.
    pub timestamp: DateTime<Utc>,
}

impl From<SampleRow> for LocationSample {
    fn from(row: SampleRow) -> Self {
        Self {
            id: row.id.into(),
            vehicle_id: row.vehicle_id.into(),
            position: GeoPoint::new(row.latitude, row.longitude),
            speed_kmh: row.speed_kmh,
            heading: row.heading,
            altitude_m: row.altitude_m,
            accuracy_m: row.accuracy_m,
            timestamp: row.timestamp,
        }
    }
}

/// A row from the `accidents` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccidentRow {
    /// Accident ID.
    pub id: Uuid,
    /// Vehicle involved.
    pub vehicle_id: Option<Uuid>,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Severity as text.
    pub severity: String,
    /// Status as text.
    pub status: String,
    /// Classifier confidence.
    pub ml_confidence: Option<f64>,
    /// Impact force.
    pub impact_force: Option<f64>,
    /// Description.
    pub description: Option<String>,
    /// Report time.
    pub reported_at: DateTime<Utc>,
}

impl TryFrom<AccidentRow> for Accident {
    type Error = DbError;

    fn try_from(row: AccidentRow) -> Result<Self, DbError> {
        Ok(Self {
            id: row.id.into(),
            vehicle_id: row.vehicle_id.map(Into::into),
            position: GeoPoint::new(row.latitude, row.longitude),
            severity: row.severity.parse()?,
            status: row.status.parse()?,
            ml_confidence: row.ml_confidence,
            impact_force: row.impact_force,
            description: row.description,
            reported_at: row.reported_at,
        })
    }
}

/// A row from the `alerts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AlertRow {
    /// Alert ID.
    pub id: Uuid,
    /// Alert type as text.
    pub alert_type: String,
    /// Source accident.
    pub accident_id: Option<Uuid>,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Radius in meters.
    pub radius_m: f64,
    /// Headline.
    pub title: String,
    /// Body.
    pub message: String,
    /// Severity as text.
    pub severity: String,
    /// Manual flag.
    pub active: bool,
    /// Expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Creator.
    pub created_by: Uuid,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AlertRow> for Alert {
    type Error = DbError;

    fn try_from(row: AlertRow) -> Result<Self, DbError> {
        Ok(Self {
            id: row.id.into(),
            alert_type: row.alert_type.parse()?,
            accident_id: row.accident_id.map(Into::into),
            position: GeoPoint::new(row.latitude, row.longitude),
            radius_m: row.radius_m,
            title: row.title,
            message: row.message,
            severity: row.severity.parse()?,
            active: row.active,
            expires_at: row.expires_at,
            created_by: row.created_by.into(),
            created_at: row.created_at,
        })
    }
}

/// An alert row with an optional distance from a query point.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RankedAlertRow {
    /// The alert columns.
    #[sqlx(flatten)]
    pub alert: AlertRow,
    /// Geodesic distance in meters; `NULL` for unfiltered queries.
    pub distance_m: Option<f64>,
}
