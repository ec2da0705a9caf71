//! `PostGIS`-backed [`FleetStore`].
//!
//! Positions are stored as `GEOGRAPHY(POINT, 4326)`, so `ST_DWithin` and
//! `ST_Distance` measure geodesic meters on the spheroid. Ties in distance
//! are broken by ID, matching the in-memory store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use fleetwatch_core::{
    AccidentFilter, ActiveAlert, FleetStore, Proximity, Ranked, StoreError, VehicleFilter,
};
use fleetwatch_types::{
    Accident, AccidentStatus, Alert, AlertId, GeoPoint, LocationSample, Severity, Vehicle,
    VehicleId, VehicleStatus,
};

use crate::error::DbError;
use crate::postgres::PostgresPool;
use crate::rows::{
    ACCIDENT_COLUMNS, ALERT_COLUMNS, AccidentRow, AlertRow, RankedAlertRow, RankedVehicleRow,
    SAMPLE_COLUMNS, SampleRow, VEHICLE_COLUMNS, VehicleRow,
};

/// Predicate shared by every active-alert query; `$1` is "now".
const ACTIVE_PREDICATE: &str = "active AND (expires_at IS NULL OR expires_at > $1)";

fn db(err: sqlx::Error) -> StoreError {
    DbError::from(err).into()
}

/// Fleet storage over a `PostgreSQL` pool with `PostGIS`.
#[derive(Debug, Clone)]
pub struct PgFleetStore {
    pool: PgPool,
}

impl PgFleetStore {
    /// Create a store sharing the connections of `pool`.
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }

    async fn vehicle_exists(&self, id: VehicleId) -> Result<bool, StoreError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM vehicles WHERE id = $1)")
                .bind(id.into_inner())
                .fetch_one(&self.pool)
                .await
                .map_err(db)?;
        Ok(exists)
    }
}

#[async_trait]
impl FleetStore for PgFleetStore {
    async fn register_vehicle(&self, vehicle: Vehicle) -> Result<Vehicle, StoreError> {
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r"INSERT INTO vehicles (id, registration_number, make, model, year, color, driver_id, status,
                                    last_location, speed_kmh, heading, last_location_time)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                      ST_SetSRID(ST_MakePoint($9, $10), 4326)::geography, $11, $12, $13)
              ON CONFLICT (registration_number) DO NOTHING
              RETURNING id",
        )
        .bind(vehicle.id.into_inner())
        .bind(&vehicle.registration_number)
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(&vehicle.color)
        .bind(vehicle.driver_id.map(Uuid::from))
        .bind(vehicle.status.as_str())
        .bind(vehicle.position.map(|p| p.longitude))
        .bind(vehicle.position.map(|p| p.latitude))
        .bind(vehicle.speed_kmh)
        .bind(vehicle.heading)
        .bind(vehicle.last_location_time)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        if inserted.is_none() {
            return Err(StoreError::Conflict {
                entity: "vehicle",
                key: vehicle.registration_number,
            });
        }
        tracing::debug!(vehicle_id = %vehicle.id, "vehicle registered");
        Ok(vehicle)
    }

    async fn get_vehicle(&self, id: VehicleId) -> Result<Option<Vehicle>, StoreError> {
        let sql = format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = $1");
        let row = sqlx::query_as::<_, VehicleRow>(&sql)
            .bind(id.into_inner())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        Ok(row.map(Vehicle::try_from).transpose()?)
    }

    async fn list_vehicles(&self, filter: VehicleFilter) -> Result<Vec<Vehicle>, StoreError> {
        let sql = format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles
             WHERE ($1::TEXT IS NULL OR status = $1)
             ORDER BY last_location_time DESC NULLS LAST, id
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, VehicleRow>(&sql)
            .bind(filter.status.map(VehicleStatus::as_str))
            .bind(filter.limit.map(i64::from))
            .bind(i64::from(filter.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        Ok(rows
            .into_iter()
            .map(Vehicle::try_from)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn record_sample(&self, sample: LocationSample) -> Result<Vehicle, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let sql = format!(
            "UPDATE vehicles
             SET last_location = ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography,
                 speed_kmh = $4, heading = $5, last_location_time = $6
             WHERE id = $1
             RETURNING {VEHICLE_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, VehicleRow>(&sql)
            .bind(sample.vehicle_id.into_inner())
            .bind(sample.position.longitude)
            .bind(sample.position.latitude)
            .bind(sample.speed_kmh)
            .bind(sample.heading)
            .bind(sample.timestamp)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db)?;

        // Dropping the transaction rolls it back.
        let Some(row) = updated else {
            return Err(StoreError::not_found("vehicle", sample.vehicle_id));
        };

        sqlx::query(
            r"INSERT INTO locations (id, vehicle_id, location, speed_kmh, heading, altitude_m, accuracy_m, timestamp)
              VALUES ($1, $2, ST_SetSRID(ST_MakePoint($3, $4), 4326)::geography, $5, $6, $7, $8, $9)",
        )
        .bind(sample.id.into_inner())
        .bind(sample.vehicle_id.into_inner())
        .bind(sample.position.longitude)
        .bind(sample.position.latitude)
        .bind(sample.speed_kmh)
        .bind(sample.heading)
        .bind(sample.altitude_m)
        .bind(sample.accuracy_m)
        .bind(sample.timestamp)
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        tx.commit().await.map_err(db)?;
        Ok(Vehicle::try_from(row)?)
    }

    async fn location_history(
        &self,
        vehicle_id: VehicleId,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<LocationSample>, StoreError> {
        if !self.vehicle_exists(vehicle_id).await? {
            return Err(StoreError::not_found("vehicle", vehicle_id));
        }
        let sql = format!(
            "SELECT {SAMPLE_COLUMNS} FROM locations
             WHERE vehicle_id = $1 AND timestamp > $2
             ORDER BY timestamp DESC, id DESC
             LIMIT $3"
        );
        let rows = sqlx::query_as::<_, SampleRow>(&sql)
            .bind(vehicle_id.into_inner())
            .bind(since)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        Ok(rows.into_iter().map(LocationSample::from).collect())
    }

    async fn vehicles_within(
        &self,
        center: GeoPoint,
        radius_m: f64,
    ) -> Result<Vec<Ranked<Vehicle>>, StoreError> {
        let sql = format!(
            "SELECT {VEHICLE_COLUMNS},
                    ST_Distance(last_location, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography) AS distance_m
             FROM vehicles
             WHERE last_location IS NOT NULL
               AND ST_DWithin(last_location, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $3)
             ORDER BY distance_m, id"
        );
        let rows = sqlx::query_as::<_, RankedVehicleRow>(&sql)
            .bind(center.longitude)
            .bind(center.latitude)
            .bind(radius_m)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;

        rows.into_iter()
            .map(|row| {
                Ok(Ranked {
                    item: Vehicle::try_from(row.vehicle)?,
                    distance_m: row.distance_m,
                })
            })
            .collect::<Result<_, DbError>>()
            .map_err(StoreError::from)
    }

    async fn insert_accident(&self, accident: Accident) -> Result<Accident, StoreError> {
        sqlx::query(
            r"INSERT INTO accidents (id, vehicle_id, location, severity, status, ml_confidence, impact_force, description, reported_at)
              VALUES ($1, $2, ST_SetSRID(ST_MakePoint($3, $4), 4326)::geography, $5, $6, $7, $8, $9, $10)",
        )
        .bind(accident.id.into_inner())
        .bind(accident.vehicle_id.map(Uuid::from))
        .bind(accident.position.longitude)
        .bind(accident.position.latitude)
        .bind(accident.severity.as_str())
        .bind(accident.status.as_str())
        .bind(accident.ml_confidence)
        .bind(accident.impact_force)
        .bind(&accident.description)
        .bind(accident.reported_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(accident)
    }

    async fn insert_alert(&self, alert: Alert) -> Result<Alert, StoreError> {
        sqlx::query(
            r"INSERT INTO alerts (id, alert_type, accident_id, location, radius_m, title, message, severity,
                                  active, expires_at, created_by, created_at)
              VALUES ($1, $2, $3, ST_SetSRID(ST_MakePoint($4, $5), 4326)::geography, $6, $7, $8, $9,
                      $10, $11, $12, $13)",
        )
        .bind(alert.id.into_inner())
        .bind(alert.alert_type.as_str())
        .bind(alert.accident_id.map(Uuid::from))
        .bind(alert.position.longitude)
        .bind(alert.position.latitude)
        .bind(alert.radius_m)
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(alert.severity.as_str())
        .bind(alert.active)
        .bind(alert.expires_at)
        .bind(alert.created_by.into_inner())
        .bind(alert.created_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(alert)
    }

    async fn list_accidents(&self, filter: AccidentFilter) -> Result<Vec<Accident>, StoreError> {
        let sql = format!(
            "SELECT {ACCIDENT_COLUMNS} FROM accidents
             WHERE ($1::TEXT IS NULL OR status = $1)
               AND ($2::TEXT IS NULL OR severity = $2)
             ORDER BY reported_at DESC, id DESC
             LIMIT $3"
        );
        let rows = sqlx::query_as::<_, AccidentRow>(&sql)
            .bind(filter.status.map(AccidentStatus::as_str))
            .bind(filter.severity.map(Severity::as_str))
            .bind(i64::from(filter.limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        Ok(rows
            .into_iter()
            .map(Accident::try_from)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn active_alerts(
        &self,
        now: DateTime<Utc>,
        proximity: Option<Proximity>,
    ) -> Result<Vec<ActiveAlert>, StoreError> {
        let rows = match proximity {
            None => {
                let sql = format!(
                    "SELECT {ALERT_COLUMNS}, NULL::DOUBLE PRECISION AS distance_m
                     FROM alerts
                     WHERE {ACTIVE_PREDICATE}
                     ORDER BY created_at DESC, id DESC"
                );
                sqlx::query_as::<_, RankedAlertRow>(&sql)
                    .bind(now)
                    .fetch_all(&self.pool)
                    .await
            }
            Some(Proximity::Within { center, radius_m }) => {
                let sql = format!(
                    "SELECT {ALERT_COLUMNS},
                            ST_Distance(location, ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography) AS distance_m
                     FROM alerts
                     WHERE {ACTIVE_PREDICATE}
                       AND ST_DWithin(location, ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography, $4)
                     ORDER BY distance_m, id"
                );
                sqlx::query_as::<_, RankedAlertRow>(&sql)
                    .bind(now)
                    .bind(center.longitude)
                    .bind(center.latitude)
                    .bind(radius_m)
                    .fetch_all(&self.pool)
                    .await
            }
            Some(Proximity::Covering { point }) => {
                let sql = format!(
                    "SELECT {ALERT_COLUMNS},
                            ST_Distance(location, ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography) AS distance_m
                     FROM alerts
                     WHERE {ACTIVE_PREDICATE}
                       AND ST_DWithin(location, ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography, radius_m)
                     ORDER BY distance_m, id"
                );
                sqlx::query_as::<_, RankedAlertRow>(&sql)
                    .bind(now)
                    .bind(point.longitude)
                    .bind(point.latitude)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(db)?;

        rows.into_iter()
            .map(|row| {
                Ok(ActiveAlert {
                    alert: Alert::try_from(row.alert)?,
                    distance_m: row.distance_m,
                })
            })
            .collect::<Result<_, DbError>>()
            .map_err(StoreError::from)
    }

    async fn deactivate_alert(&self, id: AlertId) -> Result<Alert, StoreError> {
        let sql = format!("UPDATE alerts SET active = FALSE WHERE id = $1 RETURNING {ALERT_COLUMNS}");
        let row = sqlx::query_as::<_, AlertRow>(&sql)
            .bind(id.into_inner())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or_else(|| StoreError::not_found("alert", id))?;
        tracing::info!(alert_id = %id, "alert deactivated");
        Ok(Alert::try_from(row)?)
    }
}
