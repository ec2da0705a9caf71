//! In-process [`FleetStore`] used for single-node runs and tests.
//!
//! All state sits behind one `RwLock`; a sample append and its projection
//! update happen under the same write guard.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use fleetwatch_types::{
    Accident, Alert, AlertId, GeoPoint, LocationSample, Vehicle, VehicleId,
};

use crate::alert::{ActiveAlert, Proximity, is_alert_active};
use crate::error::StoreError;
use crate::spatial::{Ranked, covering, within_radius};
use crate::store::{AccidentFilter, FleetStore, VehicleFilter};

#[derive(Debug, Default)]
struct Inner {
    vehicles: BTreeMap<VehicleId, Vehicle>,
    samples: HashMap<VehicleId, Vec<LocationSample>>,
    accidents: Vec<Accident>,
    alerts: BTreeMap<AlertId, Alert>,
}

/// A [`FleetStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Most recently positioned first, unpositioned last, then by ID.
fn by_recency(a: &Vehicle, b: &Vehicle) -> Ordering {
    match (a.last_location_time, b.last_location_time) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.id.cmp(&b.id))
}

fn to_usize(n: u32) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

#[async_trait]
impl FleetStore for MemoryStore {
    async fn register_vehicle(&self, vehicle: Vehicle) -> Result<Vehicle, StoreError> {
        let mut inner = self.inner.write().await;
        if inner
            .vehicles
            .values()
            .any(|v| v.registration_number == vehicle.registration_number)
        {
            return Err(StoreError::Conflict {
                entity: "vehicle",
                key: vehicle.registration_number,
            });
        }
        inner.vehicles.insert(vehicle.id, vehicle.clone());
        Ok(vehicle)
    }

    async fn get_vehicle(&self, id: VehicleId) -> Result<Option<Vehicle>, StoreError> {
        Ok(self.inner.read().await.vehicles.get(&id).cloned())
    }

    async fn list_vehicles(&self, filter: VehicleFilter) -> Result<Vec<Vehicle>, StoreError> {
        let inner = self.inner.read().await;
        let mut vehicles: Vec<Vehicle> = inner
            .vehicles
            .values()
            .filter(|v| filter.status.is_none_or(|s| v.status == s))
            .cloned()
            .collect();
        vehicles.sort_by(by_recency);
        Ok(vehicles
            .into_iter()
            .skip(to_usize(filter.offset))
            .take(filter.limit.map_or(usize::MAX, to_usize))
            .collect())
    }

    async fn record_sample(&self, sample: LocationSample) -> Result<Vehicle, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(vehicle) = inner.vehicles.get_mut(&sample.vehicle_id) else {
            return Err(StoreError::not_found("vehicle", sample.vehicle_id));
        };
        vehicle.apply_sample(&sample);
        let updated = vehicle.clone();
        inner
            .samples
            .entry(sample.vehicle_id)
            .or_default()
            .push(sample);
        Ok(updated)
    }

    async fn location_history(
        &self,
        vehicle_id: VehicleId,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<LocationSample>, StoreError> {
        let inner = self.inner.read().await;
        if !inner.vehicles.contains_key(&vehicle_id) {
            return Err(StoreError::not_found("vehicle", vehicle_id));
        }
        Ok(inner
            .samples
            .get(&vehicle_id)
            .map(|samples| {
                samples
                    .iter()
                    .rev()
                    .filter(|s| s.timestamp > since)
                    .take(to_usize(limit))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn vehicles_within(
        &self,
        center: GeoPoint,
        radius_m: f64,
    ) -> Result<Vec<Ranked<Vehicle>>, StoreError> {
        let inner = self.inner.read().await;
        Ok(within_radius(
            inner.vehicles.values().cloned(),
            center,
            radius_m,
        ))
    }

    async fn insert_accident(&self, accident: Accident) -> Result<Accident, StoreError> {
        self.inner.write().await.accidents.push(accident.clone());
        Ok(accident)
    }

    async fn insert_alert(&self, alert: Alert) -> Result<Alert, StoreError> {
        self.inner
            .write()
            .await
            .alerts
            .insert(alert.id, alert.clone());
        Ok(alert)
    }

    async fn list_accidents(&self, filter: AccidentFilter) -> Result<Vec<Accident>, StoreError> {
        let inner = self.inner.read().await;
        let mut accidents: Vec<Accident> = inner
            .accidents
            .iter()
            .filter(|a| filter.status.is_none_or(|s| a.status == s))
            .filter(|a| filter.severity.is_none_or(|s| a.severity == s))
            .cloned()
            .collect();
        accidents.sort_by(|a, b| b.reported_at.cmp(&a.reported_at).then_with(|| b.id.cmp(&a.id)));
        accidents.truncate(to_usize(filter.limit));
        Ok(accidents)
    }

    async fn active_alerts(
        &self,
        now: DateTime<Utc>,
        proximity: Option<Proximity>,
    ) -> Result<Vec<ActiveAlert>, StoreError> {
        let inner = self.inner.read().await;
        let active = inner
            .alerts
            .values()
            .filter(|a| is_alert_active(a, now))
            .cloned();

        let ranked = match proximity {
            None => {
                let mut alerts: Vec<Alert> = active.collect();
                alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
                return Ok(alerts
                    .into_iter()
                    .map(|alert| ActiveAlert {
                        alert,
                        distance_m: None,
                    })
                    .collect());
            }
            Some(Proximity::Within { center, radius_m }) => within_radius(active, center, radius_m),
            Some(Proximity::Covering { point }) => covering(active, point),
        };

        Ok(ranked
            .into_iter()
            .map(|r| ActiveAlert {
                alert: r.item,
                distance_m: Some(r.distance_m),
            })
            .collect())
    }

    async fn deactivate_alert(&self, id: AlertId) -> Result<Alert, StoreError> {
        let mut inner = self.inner.write().await;
        let alert = inner
            .alerts
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("alert", id))?;
        alert.active = false;
        Ok(alert.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use fleetwatch_types::{SampleId, VehicleStatus};

    use super::*;

    fn vehicle(reg: &str) -> Vehicle {
        Vehicle {
            id: VehicleId::new(),
            registration_number: reg.to_owned(),
            make: None,
            model: None,
            year: None,
            color: None,
            driver_id: None,
            status: VehicleStatus::Active,
            position: None,
            speed_kmh: 0.0,
            heading: 0.0,
            last_location_time: None,
        }
    }

    fn sample(vehicle_id: VehicleId, at: DateTime<Utc>) -> LocationSample {
        LocationSample {
            id: SampleId::new(),
            vehicle_id,
            position: GeoPoint::new(12.9, 77.6),
            speed_kmh: 10.0,
            heading: 0.0,
            altitude_m: 0.0,
            accuracy_m: 10.0,
            timestamp: at,
        }
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let store = MemoryStore::new();
        store.register_vehicle(vehicle("KA-01")).await.unwrap();
        let err = store.register_vehicle(vehicle("KA-01")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn sample_for_unknown_vehicle_writes_nothing() {
        let store = MemoryStore::new();
        let ghost = VehicleId::new();
        let err = store.record_sample(sample(ghost, Utc::now())).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "vehicle", .. }));
        assert!(store.inner.read().await.samples.is_empty());
    }

    #[tokio::test]
    async fn history_is_newest_first_and_windowed() {
        let store = MemoryStore::new();
        let v = store.register_vehicle(vehicle("KA-02")).await.unwrap();
        let now = Utc::now();
        for hours_ago in [30, 3, 2, 1] {
            store
                .record_sample(sample(v.id, now - Duration::hours(hours_ago)))
                .await
                .unwrap();
        }

        let history = store
            .location_history(v.id, now - Duration::hours(24), 2)
            .await
            .unwrap();
        let stamps: Vec<_> = history.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![now - Duration::hours(1), now - Duration::hours(2)]);
    }

    #[tokio::test]
    async fn listing_puts_unpositioned_vehicles_last() {
        let store = MemoryStore::new();
        let idle = store.register_vehicle(vehicle("KA-03")).await.unwrap();
        let moving = store.register_vehicle(vehicle("KA-04")).await.unwrap();
        store.record_sample(sample(moving.id, Utc::now())).await.unwrap();

        let listed = store.list_vehicles(VehicleFilter::default()).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![moving.id, idle.id]);
    }

    #[tokio::test]
    async fn deactivating_unknown_alert_is_not_found() {
        let store = MemoryStore::new();
        let err = store.deactivate_alert(AlertId::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "alert", .. }));
    }
}
