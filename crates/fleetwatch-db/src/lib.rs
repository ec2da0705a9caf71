//! `PostgreSQL`/`PostGIS` persistence for Fleetwatch.
//!
//! Implements the [`FleetStore`](fleetwatch_core::FleetStore) seam over a
//! pooled `sqlx` connection. Queries are built at runtime (not compile-time
//! checked), so the crate builds without a live database.
//!
//! ```text
//! services --> Arc<dyn FleetStore> --> PgFleetStore --> PostgresPool --> PostGIS
//!                                                         |-- vehicles   (current projection)
//!                                                         |-- locations  (append-only samples)
//!                                                         |-- accidents
//!                                                         +-- alerts
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- Connection pool, configuration and migrations
//! - [`store`] -- [`PgFleetStore`]
//! - [`rows`] -- Row types and conversion into domain types
//! - [`error`] -- [`DbError`]

pub mod error;
pub mod postgres;
pub mod rows;
pub mod store;

pub use error::DbError;
pub use postgres::{PostgresConfig, PostgresPool};
pub use store::PgFleetStore;
