//! Ordered, non-blocking publishing from the write path.
//!
//! [`RelayPublisher`] implements [`EventSink`]: producers enqueue with
//! `try_send` and return immediately, and a single drain task forwards events
//! to the [`Relay`] in enqueue order. A full queue or a failing relay drops
//! the event and logs at `warn`; neither is ever reported to the producer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use fleetwatch_core::EventSink;
use fleetwatch_types::RelayEvent;

use crate::Relay;

/// Queue in front of a [`Relay`].
#[derive(Debug, Clone)]
pub struct RelayPublisher {
    tx: mpsc::Sender<RelayEvent>,
    dropped: Arc<AtomicU64>,
}

impl RelayPublisher {
    /// Start the drain task and return the publisher handle.
    ///
    /// The task ends once every clone of the publisher is dropped and the
    /// queue is empty.
    pub fn spawn(relay: Arc<dyn Relay>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<RelayEvent>(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let failures = Arc::clone(&dropped);

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match relay.publish(&event).await {
                    Ok(()) => debug!(channel = %event.channel(), backend = relay.backend(), "event relayed"),
                    Err(e) => {
                        failures.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            channel = %event.channel(),
                            backend = relay.backend(),
                            error = %e,
                            "relay unavailable, event dropped"
                        );
                    }
                }
            }
            debug!("relay publisher drained");
        });

        (Self { tx, dropped }, handle)
    }

    /// Events dropped so far because the queue was full or the relay failed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for RelayPublisher {
    fn publish(&self, event: RelayEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(channel = %event.channel(), "relay queue full, event dropped");
            }
            Err(TrySendError::Closed(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(channel = %event.channel(), "relay publisher stopped, event dropped");
            }
        }
    }
}
