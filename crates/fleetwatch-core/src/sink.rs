//! Outbound notification seam between the write path and the relay.

use fleetwatch_types::RelayEvent;

/// Fire-and-forget publisher of relay events.
///
/// Implementations must not block the caller and must swallow (and log)
/// delivery failures: a durable write is never rolled back or reported as
/// failed because a notification was lost.
pub trait EventSink: Send + Sync {
    /// Hand `event` to the relay.
    fn publish(&self, event: RelayEvent);
}

/// Discards every event. For deployments or tests without a relay.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, event: RelayEvent) {
        tracing::trace!(channel = %event.channel(), "relay disabled, event discarded");
    }
}
