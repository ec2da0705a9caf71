//! Realtime gateway and REST API for Fleetwatch.
//!
//! An Axum server that exposes:
//!
//! - **WebSocket endpoint** (`/ws`): authenticated sessions subscribe to
//!   vehicle positions and accident alerts, get a snapshot, then receive
//!   incremental updates fanned out from the event relay
//! - **REST endpoints** (`/api/...`) over the ingestion, alert and query
//!   services
//!
//! # Architecture
//!
//! ```text
//! Relay --> fan-out task --> TopicRouter --> session queue --> WebSocket
//!                                 ^
//!            subscribe:* ---------+ (join, then snapshot)
//! ```
//!
//! Topic membership is per gateway instance. Several gateways can share a
//! Redis or NATS relay; each delivers only to the sessions it holds.
//!
//! # Modules
//!
//! - [`auth`] -- Token verification and role checks
//! - [`topics`] -- Per-instance topic membership and fan-out
//! - [`session`] -- WebSocket session state machine
//! - [`fanout`] -- Relay subscription feeding the topic router
//! - [`handlers`] -- REST handlers
//! - [`router`] -- Route table, CORS and tracing layers
//! - [`server`] -- Listener lifecycle
//! - [`state`] -- Shared [`AppState`]
//! - [`error`] -- [`GatewayError`]

pub mod auth;
pub mod error;
pub mod fanout;
pub mod handlers;
pub mod router;
pub mod server;
pub mod session;
pub mod state;
pub mod topics;

pub use auth::{AuthError, Claims, CurrentIdentity, IdentityProvider, JwtIdentityProvider};
pub use error::GatewayError;
pub use fanout::start_fanout;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::{AppState, GatewaySettings};
pub use topics::{SessionId, TopicRouter};
