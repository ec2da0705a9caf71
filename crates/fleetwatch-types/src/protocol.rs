//! Realtime protocol frames exchanged over the gateway WebSocket.
//!
//! Every frame is a JSON text message of the form
//! `{"event": <name>, "data": <payload>}`. Client frames carry no payload, so
//! their `data` may be omitted or hold any JSON value, which is ignored.

use chrono::{DateTime, Utc};
use serde::de::{self, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::enums::{AlertType, Severity, VehicleStatus};
use crate::events::{AccidentNotice, LocationUpdate};
use crate::ids::{AccidentId, AlertId, VehicleId};
use crate::structs::{Alert, Identity, Vehicle};

/// Frames a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "event", content = "data")]
#[ts(export, export_to = "bindings/")]
pub enum ClientMessage {
    /// Join the all-vehicles topic and receive a snapshot.
    #[serde(rename = "subscribe:vehicles")]
    SubscribeVehicles,
    /// Join the all-alerts topic and receive a snapshot.
    #[serde(rename = "subscribe:alerts")]
    SubscribeAlerts,
}

impl ClientMessage {
    const EVENTS: &'static [&'static str] = &["subscribe:vehicles", "subscribe:alerts"];
}

impl<'de> Deserialize<'de> for ClientMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Frame {
            event: String,
            #[serde(default, rename = "data")]
            _data: IgnoredAny,
        }

        let frame = Frame::deserialize(deserializer)?;
        match frame.event.as_str() {
            "subscribe:vehicles" => Ok(Self::SubscribeVehicles),
            "subscribe:alerts" => Ok(Self::SubscribeAlerts),
            other => Err(de::Error::unknown_variant(other, Self::EVENTS)),
        }
    }
}

/// Frames the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data")]
#[ts(export, export_to = "bindings/")]
pub enum ServerMessage {
    /// Sent once after authentication succeeds.
    #[serde(rename = "connected")]
    Connected(Connected),
    /// Snapshot of active vehicles.
    #[serde(rename = "vehicles:current")]
    VehiclesCurrent(Vec<VehicleSnapshot>),
    /// Snapshot of active alerts.
    #[serde(rename = "alerts:current")]
    AlertsCurrent(Vec<AlertSnapshot>),
    /// Incremental position update.
    #[serde(rename = "vehicle:location:update")]
    VehicleLocationUpdate(LocationUpdate),
    /// A new accident and its alert.
    #[serde(rename = "accident:new")]
    AccidentNew(AccidentNotice),
    /// The previous client frame was not understood.
    #[serde(rename = "error")]
    Error(ErrorNotice),
}

/// Payload of the `connected` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Connected {
    /// Human-readable welcome line.
    pub greeting: String,
    /// The verified identity of this session.
    pub identity: Identity,
}

/// Payload of the `error` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ErrorNotice {
    /// What went wrong.
    pub message: String,
}

/// One row of the `vehicles:current` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VehicleSnapshot {
    /// Vehicle ID.
    pub id: VehicleId,
    /// License plate.
    pub registration_number: String,
    /// Operational status.
    pub status: VehicleStatus,
    /// Last known speed in km/h.
    pub speed_kmh: f64,
    /// Last known heading in degrees.
    pub heading: f64,
    /// Last known latitude, absent before the first sample.
    pub latitude: Option<f64>,
    /// Last known longitude, absent before the first sample.
    pub longitude: Option<f64>,
    /// Time of the last applied sample.
    pub last_location_time: Option<DateTime<Utc>>,
}

impl From<&Vehicle> for VehicleSnapshot {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id,
            registration_number: vehicle.registration_number.clone(),
            status: vehicle.status,
            speed_kmh: vehicle.speed_kmh,
            heading: vehicle.heading,
            latitude: vehicle.position.map(|p| p.latitude),
            longitude: vehicle.position.map(|p| p.longitude),
            last_location_time: vehicle.last_location_time,
        }
    }
}

/// One row of the `alerts:current` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AlertSnapshot {
    /// Alert ID.
    pub id: AlertId,
    /// Kind of alert.
    pub alert_type: AlertType,
    /// Source accident.
    pub accident_id: Option<AccidentId>,
    /// Alert center latitude.
    pub latitude: f64,
    /// Alert center longitude.
    pub longitude: f64,
    /// Alert radius in meters.
    pub radius_m: f64,
    /// Headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Severity.
    pub severity: Severity,
    /// Expiry time.
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<&Alert> for AlertSnapshot {
    fn from(alert: &Alert) -> Self {
        Self {
            id: alert.id,
            alert_type: alert.alert_type,
            accident_id: alert.accident_id,
            latitude: alert.position.latitude,
            longitude: alert.position.longitude,
            radius_m: alert.radius_m,
            title: alert.title.clone(),
            message: alert.message.clone(),
            severity: alert.severity,
            expires_at: alert.expires_at,
            created_at: alert.created_at,
        }
    }
}
