//! In-process relay over a `tokio::sync::broadcast` channel.
//!
//! Only reaches subscribers in the same process. A subscriber that falls
//! more than `capacity` events behind skips the overflow and keeps going.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::{trace, warn};

use fleetwatch_types::RelayEvent;

use crate::error::RelayError;
use crate::{Relay, RelaySubscription};

/// A single-process relay.
#[derive(Debug, Clone)]
pub struct LocalRelay {
    tx: broadcast::Sender<RelayEvent>,
    capacity: usize,
}

impl LocalRelay {
    /// Create a relay buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }
}

#[async_trait]
impl Relay for LocalRelay {
    async fn publish(&self, event: &RelayEvent) -> Result<(), RelayError> {
        // An error only means nobody is subscribed right now.
        if self.tx.send(event.clone()).is_err() {
            trace!(channel = %event.channel(), "no local subscribers");
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<RelaySubscription, RelayError> {
        let mut rx = self.tx.subscribe();
        let (out, sub) = mpsc::channel(self.capacity);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if out.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "local relay subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(RelaySubscription::new(sub))
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}
