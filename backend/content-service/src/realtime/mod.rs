//! Realtime distribution of content events
//!
//! Push deployments keep a [`ConnectionRegistry`] of WebSocket subscribers
//! per content kind; poll deployments only advertise the poll interval.
use content_model::ContentKind;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod distributor;
pub mod relay;
pub mod session;

pub use distributor::{DistributeError, Distributor, PollDistributor, PushDistributor};
pub use relay::{EventRelay, RedisRelay};

/// Identifies one subscription so it can be removed precisely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

struct Subscriber {
    id: SubscriberId,
    sender: UnboundedSender<String>,
}

/// Subscribers per content kind.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<ContentKind, Vec<Subscriber>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_subscriber(
        &self,
        kind: ContentKind,
    ) -> (SubscriberId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let subscriber_id = SubscriberId::new();

        let mut guard = self.inner.write().await;
        let subscribers = guard.entry(kind).or_default();
        subscribers.push(Subscriber {
            id: subscriber_id,
            sender: tx,
        });

        tracing::debug!(
            kind = %kind,
            subscriber = ?subscriber_id,
            total = subscribers.len(),
            "realtime subscriber added"
        );

        (subscriber_id, rx)
    }

    pub async fn remove_subscriber(&self, kind: ContentKind, subscriber_id: SubscriberId) {
        let mut guard = self.inner.write().await;

        if let Some(subscribers) = guard.get_mut(&kind) {
            subscribers.retain(|s| s.id != subscriber_id);
            tracing::debug!(
                kind = %kind,
                subscriber = ?subscriber_id,
                remaining = subscribers.len(),
                "realtime subscriber removed"
            );

            if subscribers.is_empty() {
                guard.remove(&kind);
            }
        }
    }

    /// Send `msg` to every subscriber of `kind`. Closed receivers are
    /// dropped. Returns how many subscribers were reached.
    pub async fn broadcast(&self, kind: ContentKind, msg: String) -> usize {
        let mut guard = self.inner.write().await;
        let Some(subscribers) = guard.get_mut(&kind) else {
            return 0;
        };

        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.sender.send(msg.clone()).is_ok());
        let after = subscribers.len();

        if before != after {
            tracing::debug!(
                kind = %kind,
                dropped = before - after,
                active = after,
                "pruned closed realtime subscribers"
            );
        }
        if subscribers.is_empty() {
            guard.remove(&kind);
        }

        after
    }

    pub async fn subscriber_count(&self, kind: ContentKind) -> usize {
        let guard = self.inner.read().await;
        guard.get(&kind).map(|v| v.len()).unwrap_or(0)
    }
}
