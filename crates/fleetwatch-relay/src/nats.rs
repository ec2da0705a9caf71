//! Core NATS relay.
//!
//! Channels map to subjects under `fleet.` (`fleet.vehicle.location`,
//! `fleet.accident.reported`); subscribers listen on `fleet.>`. Core NATS has
//! no persistence, which matches the relay's at-most-once contract.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use fleetwatch_types::{Channel, RelayEvent};

use crate::error::RelayError;
use crate::{Relay, RelaySubscription};

/// Wildcard covering every relay subject.
const SUBJECT_WILDCARD: &str = "fleet.>";

/// Buffer between the NATS subscriber and the consumer.
const SUBSCRIPTION_BUFFER: usize = 1024;

/// NATS subject for a relay channel.
pub const fn subject(channel: Channel) -> &'static str {
    match channel {
        Channel::VehicleLocation => "fleet.vehicle.location",
        Channel::AccidentReported => "fleet.accident.reported",
    }
}

fn channel_for_subject(subject: &str) -> Option<Channel> {
    Channel::ALL.into_iter().find(|c| self::subject(*c) == subject)
}

/// A relay backed by a NATS server.
#[derive(Clone)]
pub struct NatsRelay {
    client: async_nats::Client,
}

impl NatsRelay {
    /// Connect to a NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Nats`] if the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, RelayError> {
        info!(url = url, "connecting to NATS relay");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| RelayError::Nats(format!("failed to connect to {url}: {e}")))?;
        info!("NATS relay connection established");
        Ok(Self { client })
    }
}

#[async_trait]
impl Relay for NatsRelay {
    async fn publish(&self, event: &RelayEvent) -> Result<(), RelayError> {
        let subject = subject(event.channel());
        let payload = event.encode()?;
        self.client
            .publish(subject, payload.into())
            .await
            .map_err(|e| RelayError::Nats(format!("failed to publish to {subject}: {e}")))?;
        debug!(subject = subject, "published to NATS");
        Ok(())
    }

    async fn subscribe(&self) -> Result<RelaySubscription, RelayError> {
        let mut subscriber = self
            .client
            .subscribe(SUBJECT_WILDCARD)
            .await
            .map_err(|e| {
                RelayError::Nats(format!("failed to subscribe to {SUBJECT_WILDCARD}: {e}"))
            })?;
        info!(subject = SUBJECT_WILDCARD, "subscribed to NATS relay subjects");

        let (out, sub) = mpsc::channel(SUBSCRIPTION_BUFFER);
        tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                let Some(channel) = channel_for_subject(message.subject.as_str()) else {
                    debug!(subject = %message.subject, "ignoring unknown subject");
                    continue;
                };
                let event = match std::str::from_utf8(&message.payload)
                    .map_err(|e| e.to_string())
                    .and_then(|text| RelayEvent::decode(channel, text).map_err(|e| e.to_string()))
                {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "malformed relay payload skipped");
                        continue;
                    }
                };
                if out.send(event).await.is_err() {
                    break;
                }
            }
            if let Err(e) = subscriber.unsubscribe().await {
                debug!(error = %e, "NATS unsubscribe failed");
            }
        });

        Ok(RelaySubscription::new(sub))
    }

    fn backend(&self) -> &'static str {
        "nats"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subjects_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(channel_for_subject(subject(channel)), Some(channel));
        }
        assert_eq!(channel_for_subject("fleet.weather"), None);
    }
}
