//! Per-instance topic membership and fan-out.
//!
//! Each live session registers once and gets a bounded outbound queue.
//! Broadcasting to a topic enqueues the frame for exactly the sessions that
//! are members at that moment. A full queue drops the frame for that session
//! only; other members are unaffected.
//!
//! Membership is local to one gateway process. Several gateways behind a load
//! balancer each fan out relay events to the sessions they hold.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use fleetwatch_types::{ServerMessage, Topic};

/// Identifies one live session within this gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Debug)]
struct SessionEntry {
    tx: mpsc::Sender<ServerMessage>,
    topics: HashSet<Topic>,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<SessionId, SessionEntry>,
    members: HashMap<Topic, HashSet<SessionId>>,
}

/// Topic membership table shared by all sessions of one gateway.
#[derive(Debug, Clone, Default)]
pub struct TopicRouter {
    inner: Arc<RwLock<Inner>>,
    next_id: Arc<AtomicU64>,
}

impl TopicRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and return its ID and outbound queue.
    pub async fn register(&self, capacity: usize) -> (SessionId, mpsc::Receiver<ServerMessage>) {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.inner.write().await.sessions.insert(
            id,
            SessionEntry {
                tx,
                topics: HashSet::new(),
            },
        );
        debug!(session = %id, "session registered");
        (id, rx)
    }

    /// Add a session to `topic`. Returns `false` if it was already a member
    /// or is not registered.
    pub async fn join(&self, session: SessionId, topic: Topic) -> bool {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.sessions.get_mut(&session) else {
            return false;
        };
        if !entry.topics.insert(topic) {
            return false;
        }
        inner.members.entry(topic).or_default().insert(session);
        debug!(session = %session, topic = %topic, "joined topic");
        true
    }

    /// Drop a session and all of its memberships.
    pub async fn remove(&self, session: SessionId) {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.sessions.remove(&session) else {
            return;
        };
        for topic in entry.topics {
            if let Some(members) = inner.members.get_mut(&topic) {
                members.remove(&session);
                if members.is_empty() {
                    inner.members.remove(&topic);
                }
            }
        }
        debug!(session = %session, "session removed");
    }

    /// Enqueue `message` for every current member of `topic`.
    ///
    /// Returns the number of sessions the frame was queued for.
    pub async fn broadcast(&self, topic: Topic, message: &ServerMessage) -> usize {
        let inner = self.inner.read().await;
        let Some(members) = inner.members.get(&topic) else {
            return 0;
        };

        let mut delivered = 0_usize;
        for session in members {
            let Some(entry) = inner.sessions.get(session) else {
                continue;
            };
            match entry.tx.try_send(message.clone()) {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(TrySendError::Full(_)) => {
                    warn!(session = %session, topic = %topic, "session queue full, frame dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(session = %session, topic = %topic, "session closing, frame skipped");
                }
            }
        }
        delivered
    }

    /// Number of sessions currently in `topic`.
    pub async fn member_count(&self, topic: Topic) -> usize {
        self.inner
            .read()
            .await
            .members
            .get(&topic)
            .map_or(0, HashSet::len)
    }

    /// Number of registered sessions.
    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fleetwatch_types::{ErrorNotice, Role};

    use super::*;

    fn frame(text: &str) -> ServerMessage {
        ServerMessage::Error(ErrorNotice {
            message: text.to_owned(),
        })
    }

    #[tokio::test]
    async fn broadcast_reaches_only_members() {
        let router = TopicRouter::new();
        let (a, mut rx_a) = router.register(8).await;
        let (_b, mut rx_b) = router.register(8).await;
        router.join(a, Topic::AllVehicles).await;

        assert_eq!(router.broadcast(Topic::AllVehicles, &frame("x")).await, 1);
        assert_eq!(rx_a.recv().await.unwrap(), frame("x"));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let router = TopicRouter::new();
        let (a, _rx) = router.register(8).await;
        assert!(router.join(a, Topic::Role(Role::Admin)).await);
        assert!(!router.join(a, Topic::Role(Role::Admin)).await);
        assert_eq!(router.member_count(Topic::Role(Role::Admin)).await, 1);
    }

    #[tokio::test]
    async fn removal_leaves_every_topic() {
        let router = TopicRouter::new();
        let (a, _rx) = router.register(8).await;
        router.join(a, Topic::AllVehicles).await;
        router.join(a, Topic::AllAlerts).await;

        router.remove(a).await;
        assert_eq!(router.member_count(Topic::AllVehicles).await, 0);
        assert_eq!(router.member_count(Topic::AllAlerts).await, 0);
        assert_eq!(router.session_count().await, 0);
        assert!(!router.join(a, Topic::AllVehicles).await);
    }

    #[tokio::test]
    async fn full_queue_drops_for_that_session_only() {
        let router = TopicRouter::new();
        let (slow, mut rx_slow) = router.register(1).await;
        let (fast, mut rx_fast) = router.register(8).await;
        router.join(slow, Topic::AllAlerts).await;
        router.join(fast, Topic::AllAlerts).await;

        router.broadcast(Topic::AllAlerts, &frame("1")).await;
        router.broadcast(Topic::AllAlerts, &frame("2")).await;

        assert_eq!(rx_slow.recv().await.unwrap(), frame("1"));
        assert!(rx_slow.try_recv().is_err());
        assert_eq!(rx_fast.recv().await.unwrap(), frame("1"));
        assert_eq!(rx_fast.recv().await.unwrap(), frame("2"));
    }
}
