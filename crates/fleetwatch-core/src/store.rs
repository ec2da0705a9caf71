//! The geospatial store seam.
//!
//! [`FleetStore`] is the durable home of vehicles, location samples,
//! accidents and alerts. Implementations must support geodesic radius
//! queries and must apply a location sample and its projection update as one
//! unit per vehicle row. The in-memory implementation lives in
//! [`memory`](crate::memory); the `PostGIS` one in `fleetwatch-db`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use fleetwatch_types::{
    Accident, AccidentStatus, Alert, AlertId, GeoPoint, LocationSample, Severity, Vehicle,
    VehicleId, VehicleStatus,
};

use crate::alert::{ActiveAlert, Proximity};
use crate::error::StoreError;
use crate::spatial::Ranked;

/// Filter for vehicle listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VehicleFilter {
    /// Only vehicles with this status.
    pub status: Option<VehicleStatus>,
    /// Page size; `None` returns everything.
    pub limit: Option<u32>,
    /// Rows to skip.
    pub offset: u32,
}

/// Filter for accident listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccidentFilter {
    /// Only accidents with this status.
    pub status: Option<AccidentStatus>,
    /// Only accidents with this severity.
    pub severity: Option<Severity>,
    /// Maximum rows.
    pub limit: u32,
}

impl Default for AccidentFilter {
    fn default() -> Self {
        Self {
            status: None,
            severity: None,
            limit: 50,
        }
    }
}

/// Durable storage with point/geography semantics.
///
/// Listing order is part of the contract:
/// - vehicles: most recent `last_location_time` first, never-positioned
///   vehicles last, then by ID;
/// - samples: newest first;
/// - accidents: newest `reported_at` first;
/// - active alerts: newest first when unfiltered, by distance then ID when
///   a [`Proximity`] filter is given.
#[async_trait]
pub trait FleetStore: Send + Sync {
    /// Provision a vehicle. Fails with [`StoreError::Conflict`] when the
    /// registration number is taken.
    async fn register_vehicle(&self, vehicle: Vehicle) -> Result<Vehicle, StoreError>;

    /// Fetch one vehicle.
    async fn get_vehicle(&self, id: VehicleId) -> Result<Option<Vehicle>, StoreError>;

    /// List vehicles.
    async fn list_vehicles(&self, filter: VehicleFilter) -> Result<Vec<Vehicle>, StoreError>;

    /// Append `sample` and overwrite its vehicle's projection.
    ///
    /// Returns the updated vehicle, or [`StoreError::NotFound`] with nothing
    /// written when the vehicle does not exist.
    async fn record_sample(&self, sample: LocationSample) -> Result<Vehicle, StoreError>;

    /// Samples of one vehicle newer than `since`, newest first.
    async fn location_history(
        &self,
        vehicle_id: VehicleId,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<LocationSample>, StoreError>;

    /// Vehicles within `radius_m` of `center`, nearest first.
    async fn vehicles_within(
        &self,
        center: GeoPoint,
        radius_m: f64,
    ) -> Result<Vec<Ranked<Vehicle>>, StoreError>;

    /// Persist a new accident.
    async fn insert_accident(&self, accident: Accident) -> Result<Accident, StoreError>;

    /// Persist a new alert.
    async fn insert_alert(&self, alert: Alert) -> Result<Alert, StoreError>;

    /// List accidents, newest first.
    async fn list_accidents(&self, filter: AccidentFilter) -> Result<Vec<Accident>, StoreError>;

    /// Alerts active at `now`, optionally filtered by proximity.
    async fn active_alerts(
        &self,
        now: DateTime<Utc>,
        proximity: Option<Proximity>,
    ) -> Result<Vec<ActiveAlert>, StoreError>;

    /// Clear an alert's active flag.
    async fn deactivate_alert(&self, id: AlertId) -> Result<Alert, StoreError>;
}
