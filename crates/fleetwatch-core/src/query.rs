//! Read-side vehicle queries.

use std::sync::Arc;

use fleetwatch_types::{GeoPoint, Vehicle, VehicleId, VehicleStatus};

use crate::error::CoreError;
use crate::spatial::{Ranked, validate_point, validate_radius};
use crate::store::{FleetStore, VehicleFilter};

/// Default page size for vehicle listings.
pub const DEFAULT_VEHICLE_LIMIT: u32 = 50;

/// Vehicle lookups, listings and radius searches.
#[derive(Clone)]
pub struct VehicleQueries {
    store: Arc<dyn FleetStore>,
    nearby_radius_m: f64,
}

impl VehicleQueries {
    /// Create the query service. `nearby_radius_m` applies when a radius
    /// search gives none.
    pub fn new(store: Arc<dyn FleetStore>, nearby_radius_m: f64) -> Self {
        Self {
            store,
            nearby_radius_m,
        }
    }

    /// Radius used by [`nearby`](Self::nearby) when none is given.
    pub const fn default_radius_m(&self) -> f64 {
        self.nearby_radius_m
    }

    /// One vehicle.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if it does not exist.
    pub async fn get(&self, id: VehicleId) -> Result<Vehicle, CoreError> {
        self.store
            .get_vehicle(id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "vehicle",
                id: id.to_string(),
            })
    }

    /// A page of vehicles.
    ///
    /// # Errors
    ///
    /// [`CoreError::Store`] if the read fails.
    pub async fn list(&self, filter: VehicleFilter) -> Result<Vec<Vehicle>, CoreError> {
        Ok(self.store.list_vehicles(filter).await?)
    }

    /// Every vehicle in service. Feeds the realtime snapshot.
    ///
    /// # Errors
    ///
    /// [`CoreError::Store`] if the read fails.
    pub async fn active(&self) -> Result<Vec<Vehicle>, CoreError> {
        self.list(VehicleFilter {
            status: Some(VehicleStatus::Active),
            limit: None,
            offset: 0,
        })
        .await
    }

    /// Vehicles within `radius_m` (or the configured default) of `center`,
    /// nearest first.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] for an invalid point or radius
    /// - [`CoreError::Store`] if the read fails
    pub async fn nearby(
        &self,
        center: GeoPoint,
        radius_m: Option<f64>,
    ) -> Result<Vec<Ranked<Vehicle>>, CoreError> {
        let center = validate_point(center)?;
        let radius_m = validate_radius(radius_m.unwrap_or(self.nearby_radius_m))?;
        Ok(self.store.vehicles_within(center, radius_m).await?)
    }
}
