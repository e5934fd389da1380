use super::{ConnectionRegistry, EventRelay};
use crate::metrics::realtime::REALTIME_EVENTS_TOTAL;
use async_trait::async_trait;
use content_model::{ContentEvent, DistributionMode};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DistributeError {
    #[error("redis relay error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Hands committed changes to connected viewers.
///
/// Called after the store write; a failure here never undoes the write.
#[async_trait]
pub trait Distributor: Send + Sync {
    fn mode(&self) -> DistributionMode;

    async fn publish(&self, event: &ContentEvent) -> Result<(), DistributeError>;
}

fn count(event: &ContentEvent, path: &str) {
    REALTIME_EVENTS_TOTAL
        .with_label_values(&[event.kind().as_str(), event.label(), path])
        .inc();
}

/// Broadcasts to local WebSocket subscribers, or through a relay when one
/// is configured so every instance sees every event.
///
/// While the relay is not delivering to this instance, events are
/// broadcast locally as well as relayed.
pub struct PushDistributor {
    registry: ConnectionRegistry,
    relay: Option<Arc<dyn EventRelay>>,
}

impl PushDistributor {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self {
            registry,
            relay: None,
        }
    }

    pub fn with_relay(registry: ConnectionRegistry, relay: Arc<dyn EventRelay>) -> Self {
        Self {
            registry,
            relay: Some(relay),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }
}

#[async_trait]
impl Distributor for PushDistributor {
    fn mode(&self) -> DistributionMode {
        DistributionMode::Push
    }

    async fn publish(&self, event: &ContentEvent) -> Result<(), DistributeError> {
        let payload = serde_json::to_string(event)?;

        if let Some(relay) = &self.relay {
            match relay.publish(&payload).await {
                Ok(_) if relay.is_listening() => {
                    count(event, "relay");
                    return Ok(());
                }
                Ok(_) => {
                    tracing::warn!(kind = %event.kind(), id = event.id(), "relay subscription down, broadcasting locally");
                    self.registry.broadcast(event.kind(), payload).await;
                    count(event, "local");
                    return Ok(());
                }
                Err(err) => {
                    // Local viewers still get it; other instances catch up on their next poll.
                    tracing::warn!(error = %err, kind = %event.kind(), id = event.id(), "relay publish failed, broadcasting locally");
                    self.registry.broadcast(event.kind(), payload).await;
                    count(event, "local");
                    return Err(err.into());
                }
            }
        }

        let reached = self.registry.broadcast(event.kind(), payload).await;
        count(event, "local");
        tracing::debug!(kind = %event.kind(), id = event.id(), event = event.label(), reached, "event broadcast");
        Ok(())
    }
}

/// Push disabled; clients re-fetch the recent list on an interval.
#[derive(Debug, Default, Clone, Copy)]
pub struct PollDistributor;

#[async_trait]
impl Distributor for PollDistributor {
    fn mode(&self) -> DistributionMode {
        DistributionMode::Poll
    }

    async fn publish(&self, event: &ContentEvent) -> Result<(), DistributeError> {
        count(event, "poll");
        Ok(())
    }
}
