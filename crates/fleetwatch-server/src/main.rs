//! Fleetwatch service binary.
//!
//! Wires the configured store, relay and identity provider into the core
//! services and serves the gateway until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `fleetwatch.yaml` (or `FLEETWATCH_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Open the store (in-memory, or `PostgreSQL` with migrations)
//! 4. Connect the relay backend
//! 5. Start the relay publisher
//! 6. Build the identity provider
//! 7. Assemble the gateway state
//! 8. Start the relay fan-out
//! 9. Serve HTTP and WebSocket traffic
//!
//! On shutdown the fan-out stops, queued relay events drain, and the database
//! pool (if any) closes.

mod error;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fleetwatch_core::config::{LogFormat, LoggingConfig, StoreBackend};
use fleetwatch_core::{FleetConfig, FleetStore, MemoryStore, SystemClock};
use fleetwatch_db::{PgFleetStore, PostgresConfig, PostgresPool};
use fleetwatch_gateway::{AppState, JwtIdentityProvider, ServerConfig, start_fanout, start_server};
use fleetwatch_relay::RelayPublisher;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::StartupError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "fleetwatch.yaml";

/// How long to wait for queued relay events on shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Application entry point for the service.
///
/// # Errors
///
/// Returns an error if any startup step fails or the gateway stops serving
/// abnormally.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Environment overrides are applied by the loader.
    let config_path = std::env::var("FLEETWATCH_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = FleetConfig::load_or_default(&config_path).map_err(StartupError::from)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        config = %config_path.display(),
        store = ?config.infrastructure.store,
        relay = ?config.relay.backend,
        port = config.server.port,
        "fleetwatch-server starting"
    );

    // 3. Open the store.
    let (store, pool) = open_store(&config).await?;

    // 4. Connect the relay backend.
    let relay = fleetwatch_relay::connect(&config).await.map_err(StartupError::from)?;

    // 5. Start the relay publisher.
    let (publisher, drain) =
        RelayPublisher::spawn(Arc::clone(&relay), config.relay.publish_queue_capacity);
    info!(
        capacity = config.relay.publish_queue_capacity,
        "relay publisher started"
    );

    // 6. Build the identity provider.
    let identity = JwtIdentityProvider::from_config(&config.auth).map_err(StartupError::from)?;

    // 7. Assemble the gateway state.
    let state = Arc::new(AppState::new(
        store,
        Arc::new(publisher.clone()),
        Arc::new(SystemClock),
        Arc::new(identity),
        &config,
    ));

    // 8. Start the relay fan-out.
    let fanout = start_fanout(relay, state.topics.clone())
        .await
        .map_err(StartupError::from)?;

    // 9. Serve until Ctrl-C.
    let served = start_server(&ServerConfig::from(&config.server), state).await;

    fanout.abort();
    drop(publisher);
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        tracing::warn!("relay publisher did not drain before shutdown");
    }
    if let Some(pool) = pool {
        pool.close().await;
    }

    served.map_err(StartupError::from)?;
    info!("fleetwatch-server shutdown complete");
    Ok(())
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Open the configured [`FleetStore`], along with its pool when it has one.
async fn open_store(
    config: &FleetConfig,
) -> Result<(Arc<dyn FleetStore>, Option<PostgresPool>), StartupError> {
    match config.infrastructure.store {
        StoreBackend::Memory => {
            info!("using in-memory store, data is lost on restart");
            Ok((Arc::new(MemoryStore::new()), None))
        }
        StoreBackend::Postgres => {
            let pool =
                PostgresPool::connect(&PostgresConfig::from_infrastructure(&config.infrastructure))
                    .await?;
            pool.run_migrations().await?;
            info!(
                max_connections = config.infrastructure.max_connections,
                "PostgreSQL store ready"
            );
            Ok((Arc::new(PgFleetStore::new(&pool)), Some(pool)))
        }
    }
}
