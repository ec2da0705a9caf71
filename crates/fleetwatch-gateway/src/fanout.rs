//! Relay-to-session fan-out.
//!
//! One task per gateway subscribes to the relay and turns each
//! [`RelayEvent`] into the matching server frame for its topic. Delivery is
//! to whoever is a member when the event arrives; nothing is buffered for
//! sessions that join later.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use fleetwatch_relay::{Relay, RelayError};
use fleetwatch_types::{RelayEvent, ServerMessage, Topic};

use crate::topics::TopicRouter;

/// Topic and frame for one relay event.
pub fn route(event: RelayEvent) -> (Topic, ServerMessage) {
    match event {
        RelayEvent::LocationUpdated(update) => {
            (Topic::AllVehicles, ServerMessage::VehicleLocationUpdate(update))
        }
        RelayEvent::AccidentReported(notice) => {
            (Topic::AllAlerts, ServerMessage::AccidentNew(notice))
        }
    }
}

/// Subscribe to `relay` and spawn the fan-out loop.
///
/// The subscription is live when this returns, so events published
/// afterwards reach the router.
///
/// # Errors
///
/// Returns [`RelayError`] if the subscription cannot be established.
pub async fn start_fanout(
    relay: Arc<dyn Relay>,
    topics: TopicRouter,
) -> Result<JoinHandle<()>, RelayError> {
    let mut subscription = relay.subscribe().await?;
    let backend = relay.backend();
    info!(backend, "relay fan-out started");

    Ok(tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            let (topic, message) = route(event);
            let delivered = topics.broadcast(topic, &message).await;
            debug!(topic = %topic, delivered, "relay event fanned out");
        }
        warn!(backend, "relay subscription ended, fan-out stopped");
    }))
}
