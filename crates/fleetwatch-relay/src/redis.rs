//! Redis pub/sub relay.
//!
//! Events are published as JSON strings on the channels `vehicle:location`
//! and `accident:reported`. Each [`subscribe`](Relay::subscribe) call opens a
//! dedicated subscriber connection that re-subscribes after reconnects.

use async_trait::async_trait;
use fred::prelude::*;
use fred::types::Message;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use fleetwatch_types::{Channel, RelayEvent};

use crate::error::RelayError;
use crate::{Relay, RelaySubscription};

/// Buffer between the subscriber connection and the consumer.
const SUBSCRIPTION_BUFFER: usize = 1024;

/// A relay backed by Redis (or any Redis-compatible server).
#[derive(Clone)]
pub struct RedisRelay {
    config: Config,
    client: Client,
}

impl RedisRelay {
    /// Connect the publishing client.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] if the URL cannot be parsed, or
    /// [`RelayError::Redis`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, RelayError> {
        let config = Config::from_url(url)
            .map_err(|e| RelayError::Config(format!("invalid Redis URL: {e}")))?;

        let client = Builder::from_config(config.clone()).build()?;
        client.init().await?;

        info!("connected to Redis relay");
        Ok(Self { config, client })
    }
}

/// Turn one pub/sub message into an event, logging anything malformed.
fn decode(message: &Message) -> Option<RelayEvent> {
    let name: &str = &message.channel;
    let Some(channel) = Channel::from_name(name) else {
        debug!(channel = name, "ignoring message on unknown channel");
        return None;
    };
    let Some(payload) = message.value.as_string() else {
        warn!(channel = %channel, "relay payload is not a string");
        return None;
    };
    match RelayEvent::decode(channel, &payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(channel = %channel, error = %e, "malformed relay payload skipped");
            None
        }
    }
}

#[async_trait]
impl Relay for RedisRelay {
    async fn publish(&self, event: &RelayEvent) -> Result<(), RelayError> {
        let payload = event.encode()?;
        let receivers: i64 = self
            .client
            .publish(event.channel().name(), payload.as_str())
            .await?;
        debug!(channel = %event.channel(), receivers, "published to Redis");
        Ok(())
    }

    async fn subscribe(&self) -> Result<RelaySubscription, RelayError> {
        let subscriber = Builder::from_config(self.config.clone()).build_subscriber_client()?;
        subscriber.init().await?;
        let _resubscribe = subscriber.manage_subscriptions();

        let mut messages = subscriber.message_rx();
        subscriber
            .subscribe(Channel::ALL.map(Channel::name).to_vec())
            .await?;
        info!("subscribed to Redis relay channels");

        let (out, sub) = mpsc::channel(SUBSCRIPTION_BUFFER);
        tokio::spawn(async move {
            loop {
                match messages.recv().await {
                    Ok(message) => {
                        let Some(event) = decode(&message) else { continue };
                        if out.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Redis relay subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            if let Err(e) = subscriber.quit().await {
                debug!(error = %e, "Redis subscriber quit failed");
            }
        });

        Ok(RelaySubscription::new(sub))
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
