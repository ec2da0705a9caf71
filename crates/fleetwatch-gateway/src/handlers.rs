//! REST endpoint handlers.
//!
//! Thin adapters over the core services. Every route except `/health`
//! requires a bearer token; write routes also check the caller's role.
//! Responses wrap their payload in a named field, with a `count` for lists.
//!
//! # Endpoints
//!
//! | Method | Path | Roles |
//! |--------|------|-------|
//! | `GET` | `/health` | none |
//! | `GET` | `/api/vehicles` | any |
//! | `GET` | `/api/vehicles/nearby` | any |
//! | `GET` | `/api/vehicles/{id}` | any |
//! | `POST` | `/api/vehicles/{id}/location` | driver, admin |
//! | `GET` | `/api/vehicles/{id}/history` | any |
//! | `GET` | `/api/accidents` | any |
//! | `POST` | `/api/accidents` | driver, admin |
//! | `GET` | `/api/accidents/alerts` | any |
//! | `POST` | `/api/alerts/{id}/deactivate` | admin |

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::{Value, json};

use fleetwatch_core::{AccidentFilter, AccidentReport, LocationReport, Proximity, VehicleFilter};
use fleetwatch_core::query::DEFAULT_VEHICLE_LIMIT;
use fleetwatch_types::{GeoPoint, Role};

use crate::auth::{CurrentIdentity, require_role};
use crate::error::GatewayError;
use crate::state::AppState;

/// Roles allowed to submit locations and accidents.
const REPORTERS: &[Role] = &[Role::Driver, Role::Admin];

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for `GET /api/vehicles`.
#[derive(Debug, Default, Deserialize)]
pub struct VehicleListQuery {
    /// `active`, `inactive` or `maintenance`.
    pub status: Option<String>,
    /// Page size (default 50).
    pub limit: Option<u32>,
    /// Rows to skip (default 0).
    pub offset: Option<u32>,
}

/// Query parameters for point searches.
#[derive(Debug, Default, Deserialize)]
pub struct PointQuery {
    /// Latitude in degrees.
    pub latitude: Option<f64>,
    /// Longitude in degrees.
    pub longitude: Option<f64>,
    /// Search radius in meters.
    pub radius: Option<f64>,
    /// Alerts only: match alerts whose own radius covers the point.
    #[serde(default)]
    pub covering: bool,
}

impl PointQuery {
    fn point(&self) -> Result<Option<GeoPoint>, GatewayError> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Ok(Some(GeoPoint::new(latitude, longitude))),
            (None, None) => Ok(None),
            _ => Err(GatewayError::Validation(String::from(
                "latitude and longitude must be given together",
            ))),
        }
    }
}

/// Query parameters for `GET /api/vehicles/{id}/history`.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Window in hours (default 24).
    pub hours: Option<u32>,
    /// Maximum samples (default 100).
    pub limit: Option<u32>,
}

/// Query parameters for `GET /api/accidents`.
#[derive(Debug, Default, Deserialize)]
pub struct AccidentListQuery {
    /// Accident status filter.
    pub status: Option<String>,
    /// Severity filter.
    pub severity: Option<String>,
    /// Maximum rows (default 50).
    pub limit: Option<u32>,
}

// ---------------------------------------------------------------------------
// Extraction helpers
// ---------------------------------------------------------------------------

fn query<T>(extracted: Result<Query<T>, QueryRejection>) -> Result<T, GatewayError> {
    extracted
        .map(|Query(q)| q)
        .map_err(|e| GatewayError::Validation(e.body_text()))
}

fn body<T>(extracted: Result<Json<T>, JsonRejection>) -> Result<T, GatewayError> {
    extracted
        .map(|Json(b)| b)
        .map_err(|e| GatewayError::Validation(e.body_text()))
}

fn parse_id<T>(raw: &str, entity: &str) -> Result<T, GatewayError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| GatewayError::Validation(format!("invalid {entity} id {raw:?}: {e}")))
}

fn parse_filter<T>(raw: Option<&str>) -> Result<Option<T>, GatewayError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    raw.map(str::parse)
        .transpose()
        .map_err(|e: T::Err| GatewayError::Validation(e.to_string()))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// List vehicles, most recently positioned first.
pub async fn list_vehicles(
    _caller: CurrentIdentity,
    State(state): State<Arc<AppState>>,
    params: Result<Query<VehicleListQuery>, QueryRejection>,
) -> Result<Json<Value>, GatewayError> {
    let params = query(params)?;
    let filter = VehicleFilter {
        status: parse_filter(params.status.as_deref())?,
        limit: Some(params.limit.unwrap_or(DEFAULT_VEHICLE_LIMIT)),
        offset: params.offset.unwrap_or(0),
    };
    let vehicles = state.vehicles.list(filter).await?;
    Ok(Json(json!({ "count": vehicles.len(), "vehicles": vehicles })))
}

/// Vehicles within a radius of a point, nearest first.
pub async fn nearby_vehicles(
    _caller: CurrentIdentity,
    State(state): State<Arc<AppState>>,
    params: Result<Query<PointQuery>, QueryRejection>,
) -> Result<Json<Value>, GatewayError> {
    let params = query(params)?;
    let center = params.point()?.ok_or_else(|| {
        GatewayError::Validation(String::from("latitude and longitude are required"))
    })?;
    let radius_m = params.radius.unwrap_or_else(|| state.vehicles.default_radius_m());
    let vehicles = state.vehicles.nearby(center, Some(radius_m)).await?;
    Ok(Json(json!({
        "count": vehicles.len(),
        "radius_meters": radius_m,
        "vehicles": vehicles,
    })))
}

/// One vehicle.
pub async fn get_vehicle(
    _caller: CurrentIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    let vehicle = state.vehicles.get(parse_id(&id, "vehicle")?).await?;
    Ok(Json(json!({ "vehicle": vehicle })))
}

/// Record a position report for a vehicle.
pub async fn post_location(
    CurrentIdentity(caller): CurrentIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    report: Result<Json<LocationReport>, JsonRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    require_role(&caller, REPORTERS)?;
    let vehicle_id = parse_id(&id, "vehicle")?;
    let report = body(report)?;
    let recorded = state.ingestion.ingest(vehicle_id, &report).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "sample": recorded.sample, "vehicle": recorded.vehicle })),
    ))
}

/// Recent samples of one vehicle, newest first.
pub async fn location_history(
    _caller: CurrentIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    params: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Value>, GatewayError> {
    let params = query(params)?;
    let history = state
        .ingestion
        .history(parse_id(&id, "vehicle")?, params.hours, params.limit)
        .await?;
    Ok(Json(json!({ "count": history.len(), "history": history })))
}

/// List accidents, newest first.
pub async fn list_accidents(
    _caller: CurrentIdentity,
    State(state): State<Arc<AppState>>,
    params: Result<Query<AccidentListQuery>, QueryRejection>,
) -> Result<Json<Value>, GatewayError> {
    let params = query(params)?;
    let defaults = AccidentFilter::default();
    let filter = AccidentFilter {
        status: parse_filter(params.status.as_deref())?,
        severity: parse_filter(params.severity.as_deref())?,
        limit: params.limit.unwrap_or(defaults.limit),
    };
    let accidents = state.alerts.list_accidents(filter).await?;
    Ok(Json(json!({ "accidents": accidents, "count": accidents.len() })))
}

/// Report an accident and raise its alert.
pub async fn report_accident(
    CurrentIdentity(caller): CurrentIdentity,
    State(state): State<Arc<AppState>>,
    report: Result<Json<AccidentReport>, JsonRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    require_role(&caller, REPORTERS)?;
    let report = body(report)?;
    let reported = state.alerts.report_accident(report, caller.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "accident": reported.accident, "alert": reported.alert })),
    ))
}

/// Alerts active now, optionally near a point.
///
/// With `latitude` and `longitude`, alerts within `radius` (default 5000 m)
/// are returned nearest first; adding `covering=true` instead returns alerts
/// whose own radius covers the point. A covering query takes no `radius`.
pub async fn active_alerts(
    _caller: CurrentIdentity,
    State(state): State<Arc<AppState>>,
    params: Result<Query<PointQuery>, QueryRejection>,
) -> Result<Json<Value>, GatewayError> {
    let params = query(params)?;
    if params.covering && params.radius.is_some() {
        return Err(GatewayError::Validation(String::from(
            "radius cannot be combined with covering",
        )));
    }
    let proximity = match params.point()? {
        None if params.covering => {
            return Err(GatewayError::Validation(String::from(
                "covering requires latitude and longitude",
            )));
        }
        None => None,
        Some(point) if params.covering => Some(Proximity::Covering { point }),
        Some(center) => Some(Proximity::Within {
            center,
            radius_m: params
                .radius
                .unwrap_or(state.settings.alert_query_radius_m),
        }),
    };
    let alerts = state.alerts.active_alerts(proximity).await?;
    Ok(Json(json!({ "alerts": alerts, "count": alerts.len() })))
}

/// Switch an alert off.
pub async fn deactivate_alert(
    CurrentIdentity(caller): CurrentIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    require_role(&caller, &[Role::Admin])?;
    let alert = state.alerts.deactivate(parse_id(&id, "alert")?).await?;
    Ok(Json(json!({ "alert": alert })))
}
