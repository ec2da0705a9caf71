//! Terminal realtime client for Fleetwatch.
//!
//! Connects to a gateway, subscribes to vehicle and alert updates, and
//! prints every frame until interrupted.
//!
//! ```text
//! FLEETWATCH_TOKEN=<jwt> fleetwatch-watch ws://localhost:5000/ws
//! ```

mod client;
mod config;
mod error;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::WatchConfig;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the token is rejected,
/// or every reconnection attempt fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let config = WatchConfig::from_env(std::env::args().skip(1))?;
    info!(
        url = config.url,
        max_attempts = config.max_attempts,
        backoff_ms = config.backoff.as_millis(),
        "fleetwatch-watch starting"
    );

    tokio::select! {
        result = client::run(&config) => result?,
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }
    Ok(())
}
