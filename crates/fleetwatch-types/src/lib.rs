//! Shared type definitions for Fleetwatch.
//!
//! This crate is the single source of truth for the fleet data model, the
//! relay events and the realtime protocol. Types defined here flow to
//! `TypeScript` via `ts-rs` for dashboard clients.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for entity identifiers
//! - [`enums`] -- Status, severity and role enumerations
//! - [`structs`] -- Vehicles, samples, accidents, alerts, identities
//! - [`events`] -- Relay channels and event payloads
//! - [`protocol`] -- WebSocket frames and snapshot rows
//! - [`topic`] -- Session fan-out topics

pub mod enums;
pub mod events;
pub mod ids;
pub mod protocol;
pub mod structs;
pub mod topic;

pub use enums::{AccidentStatus, AlertType, Role, Severity, UnknownVariant, VehicleStatus};
pub use events::{AccidentNotice, Channel, LocationUpdate, RelayEvent};
pub use ids::{AccidentId, AlertId, IdentityId, SampleId, VehicleId};
pub use protocol::{AlertSnapshot, ClientMessage, Connected, ErrorNotice, ServerMessage, VehicleSnapshot};
pub use structs::{Accident, Alert, GeoPoint, Identity, LocationSample, Vehicle};
pub use topic::Topic;
