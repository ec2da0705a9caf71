//! Relay events published by the write path and consumed by gateways.
//!
//! Each event kind travels on its own [`Channel`]. The payload structs are
//! also forwarded verbatim to realtime clients, so their camelCase JSON form
//! is part of the public protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::Severity;
use crate::ids::{AccidentId, AlertId, VehicleId};
use crate::structs::{Accident, Alert, LocationSample};

/// A relay channel. Ordering holds within a channel, never across them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Location updates from ingestion.
    VehicleLocation,
    /// Accident reports from the alert lifecycle manager.
    AccidentReported,
}

impl Channel {
    /// Every channel, in subscription order.
    pub const ALL: [Self; 2] = [Self::VehicleLocation, Self::AccidentReported];

    /// Name used on the wire by network relay backends.
    pub const fn name(self) -> &'static str {
        match self {
            Self::VehicleLocation => "vehicle:location",
            Self::AccidentReported => "accident:reported",
        }
    }

    /// Resolve a wire name back to a channel.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl core::fmt::Display for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload of a location-updated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct LocationUpdate {
    /// Vehicle that moved.
    pub vehicle_id: VehicleId,
    /// New latitude.
    pub latitude: f64,
    /// New longitude.
    pub longitude: f64,
    /// Speed in km/h.
    pub speed: f64,
    /// Heading in degrees.
    pub heading: f64,
    /// Ingest time of the sample.
    pub timestamp: DateTime<Utc>,
}

impl From<&LocationSample> for LocationUpdate {
    fn from(sample: &LocationSample) -> Self {
        Self {
            vehicle_id: sample.vehicle_id,
            latitude: sample.position.latitude,
            longitude: sample.position.longitude,
            speed: sample.speed_kmh,
            heading: sample.heading,
            timestamp: sample.timestamp,
        }
    }
}

/// Payload of an accident-reported event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AccidentNotice {
    /// The durable accident.
    pub accident_id: AccidentId,
    /// The alert derived from it.
    pub alert_id: AlertId,
    /// Accident latitude.
    pub latitude: f64,
    /// Accident longitude.
    pub longitude: f64,
    /// Reported severity.
    pub severity: Severity,
    /// Report time.
    pub timestamp: DateTime<Utc>,
}

impl AccidentNotice {
    /// Build the notice for an accident and the alert derived from it.
    pub const fn new(accident: &Accident, alert: &Alert) -> Self {
        Self {
            accident_id: accident.id,
            alert_id: alert.id,
            latitude: accident.position.latitude,
            longitude: accident.position.longitude,
            severity: accident.severity,
            timestamp: accident.reported_at,
        }
    }
}

/// An event carried by the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// A vehicle reported a new position.
    LocationUpdated(LocationUpdate),
    /// An accident and its alert were stored.
    AccidentReported(AccidentNotice),
}

impl RelayEvent {
    /// Channel this event is published on.
    pub const fn channel(&self) -> Channel {
        match self {
            Self::LocationUpdated(_) => Channel::VehicleLocation,
            Self::AccidentReported(_) => Channel::AccidentReported,
        }
    }

    /// Serialize the payload (without the channel) to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::LocationUpdated(update) => serde_json::to_string(update),
            Self::AccidentReported(notice) => serde_json::to_string(notice),
        }
    }

    /// Parse a payload received on `channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not match the channel's schema.
    pub fn decode(channel: Channel, payload: &str) -> Result<Self, serde_json::Error> {
        match channel {
            Channel::VehicleLocation => serde_json::from_str(payload).map(Self::LocationUpdated),
            Channel::AccidentReported => serde_json::from_str(payload).map(Self::AccidentReported),
        }
    }
}
