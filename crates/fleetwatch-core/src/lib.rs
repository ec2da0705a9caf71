//! Fleet tracking core: geodesic queries, location ingestion and the alert
//! lifecycle.
//!
//! Services here are storage- and transport-agnostic. Durable state goes
//! through the [`FleetStore`] trait; notifications leave through the
//! [`EventSink`] trait and are never awaited by the write path.
//!
//! # Modules
//!
//! - [`alert`] -- Alert derivation policy and the pure expiry check.
//! - [`clock`] -- [`Clock`] trait with system and manual implementations.
//! - [`config`] -- Configuration loading from `fleetwatch.yaml`.
//! - [`error`] -- [`CoreError`] and [`StoreError`].
//! - [`ingest`] -- Location ingestion and history.
//! - [`lifecycle`] -- Accident reporting, active-alert queries, deactivation.
//! - [`memory`] -- In-process [`FleetStore`].
//! - [`query`] -- Vehicle lookups and radius searches.
//! - [`sink`] -- [`EventSink`] seam to the relay.
//! - [`spatial`] -- Geodesic distance and radius ranking.
//! - [`store`] -- The [`FleetStore`] trait and listing filters.
//!
//! [`Clock`]: clock::Clock
//! [`CoreError`]: error::CoreError
//! [`StoreError`]: error::StoreError
//! [`EventSink`]: sink::EventSink
//! [`FleetStore`]: store::FleetStore

pub mod alert;
pub mod clock;
pub mod config;
pub mod error;
pub mod ingest;
pub mod lifecycle;
pub mod memory;
pub mod query;
pub mod sink;
pub mod spatial;
pub mod store;

pub use alert::{ActiveAlert, AlertPolicy, Proximity, is_alert_active};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::FleetConfig;
pub use error::{CoreError, StoreError};
pub use ingest::{IngestionService, LocationReport, SampleRecorded};
pub use lifecycle::{AccidentReport, AccidentReported, AlertService};
pub use memory::MemoryStore;
pub use query::VehicleQueries;
pub use sink::{EventSink, NullSink};
pub use spatial::Ranked;
pub use store::{AccidentFilter, FleetStore, VehicleFilter};
