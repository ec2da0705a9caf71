//! Best-effort publish/subscribe relay between writers and gateways.
//!
//! Delivery is at most once per subscriber, ordered within a channel and
//! unordered across channels. There is no durability or replay: a gateway
//! that is not subscribed when an event is published never sees it.
//!
//! # Modules
//!
//! - [`local`] -- In-process broadcast backend
//! - [`redis`] -- Redis pub/sub backend (`fred`)
//! - [`nats`] -- Core NATS backend (`async-nats`)
//! - [`publisher`] -- Non-blocking ordered [`RelayPublisher`]
//! - [`error`] -- [`RelayError`]

pub mod error;
pub mod local;
pub mod nats;
pub mod publisher;
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use fleetwatch_core::config::{FleetConfig, RelayBackend};
use fleetwatch_types::RelayEvent;

pub use error::RelayError;
pub use local::LocalRelay;
pub use nats::NatsRelay;
pub use publisher::RelayPublisher;
pub use redis::RedisRelay;

/// A publish/subscribe transport for [`RelayEvent`]s.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Publish one event on its channel.
    async fn publish(&self, event: &RelayEvent) -> Result<(), RelayError>;

    /// Start receiving events on every channel.
    ///
    /// Events published after this returns are delivered; earlier ones are
    /// not.
    async fn subscribe(&self) -> Result<RelaySubscription, RelayError>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// A live subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct RelaySubscription {
    rx: mpsc::Receiver<RelayEvent>,
}

impl RelaySubscription {
    /// Wrap the receiving half fed by a backend task.
    pub const fn new(rx: mpsc::Receiver<RelayEvent>) -> Self {
        Self { rx }
    }

    /// The next event, or `None` once the backend has shut down.
    pub async fn next(&mut self) -> Option<RelayEvent> {
        self.rx.recv().await
    }
}

/// Connect the relay backend named in the configuration.
///
/// # Errors
///
/// Returns [`RelayError`] if the backend cannot be reached.
pub async fn connect(config: &FleetConfig) -> Result<Arc<dyn Relay>, RelayError> {
    let relay: Arc<dyn Relay> = match config.relay.backend {
        RelayBackend::Local => Arc::new(LocalRelay::new(config.relay.local_capacity)),
        RelayBackend::Redis => Arc::new(RedisRelay::connect(&config.infrastructure.redis_url).await?),
        RelayBackend::Nats => Arc::new(NatsRelay::connect(&config.infrastructure.nats_url).await?),
    };
    tracing::info!(backend = relay.backend(), "relay ready");
    Ok(relay)
}
