use super::ConnectionRegistry;
use async_trait::async_trait;
use content_model::ContentEvent;
use futures_util::StreamExt;
use redis::aio::{ConnectionManager, PubSub};
use redis::{AsyncCommands, Client, RedisError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const DEFAULT_CHANNEL: &str = "hearth:content-events";

const RESUBSCRIBE_BASE: Duration = Duration::from_millis(500);
const RESUBSCRIBE_MAX: Duration = Duration::from_secs(30);

/// Cross-instance fan-out used by the push distributor.
#[async_trait]
pub trait EventRelay: Send + Sync {
    /// Returns the number of instances that received the payload.
    async fn publish(&self, payload: &str) -> Result<usize, RedisError>;

    /// Whether this instance is currently receiving relayed events. While
    /// it is not, its own events must be broadcast locally.
    fn is_listening(&self) -> bool;
}

/// Redis pub/sub fan-out between service instances.
///
/// Every instance publishes its events to one channel and re-broadcasts
/// whatever arrives on it to its own subscribers, including its own
/// events. Delivery is at-least-once.
#[derive(Clone)]
pub struct RedisRelay {
    client: Client,
    conn: ConnectionManager,
    channel: String,
    listening: Arc<AtomicBool>,
}

impl RedisRelay {
    pub async fn connect(redis_url: &str, channel: impl Into<String>) -> Result<Self, RedisError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client.clone()).await?;

        Ok(Self {
            client,
            conn,
            channel: channel.into(),
            listening: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn ping(&self) -> Result<(), RedisError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    /// Subscribe and forward channel messages into `registry`.
    ///
    /// The first subscription must succeed. After that a dropped
    /// subscription is retried with backoff for as long as the task runs.
    pub async fn listen(&self, registry: ConnectionRegistry) -> Result<JoinHandle<()>, RedisError> {
        let pubsub = subscribe(&self.client, &self.channel).await?;
        self.listening.store(true, Ordering::SeqCst);
        info!(channel = %self.channel, "subscribed to content events");

        let client = self.client.clone();
        let channel = self.channel.clone();
        let listening = ListeningFlag(self.listening.clone());

        let handle = tokio::spawn(async move {
            let mut pubsub = pubsub;
            loop {
                forward(pubsub, &registry).await;
                listening.set(false);
                warn!(channel = %channel, "content event subscription ended, resubscribing");

                let mut attempt = 0;
                pubsub = loop {
                    tokio::time::sleep(resubscribe_delay(attempt)).await;
                    match subscribe(&client, &channel).await {
                        Ok(pubsub) => break pubsub,
                        Err(e) => {
                            attempt = attempt.saturating_add(1);
                            warn!(channel = %channel, attempt, error = %e, "resubscribe failed");
                        }
                    }
                };
                listening.set(true);
                info!(channel = %channel, "resubscribed to content events");
            }
        });

        Ok(handle)
    }
}

#[async_trait]
impl EventRelay for RedisRelay {
    async fn publish(&self, payload: &str) -> Result<usize, RedisError> {
        let mut conn = self.conn.clone();
        let receivers: usize = conn.publish(&self.channel, payload).await?;
        debug!(channel = %self.channel, receivers, "event relayed");
        Ok(receivers)
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}

/// Clears the shared flag when the listener task ends, panics included.
struct ListeningFlag(Arc<AtomicBool>);

impl ListeningFlag {
    fn set(&self, up: bool) {
        self.0.store(up, Ordering::SeqCst);
    }
}

impl Drop for ListeningFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn subscribe(client: &Client, channel: &str) -> Result<PubSub, RedisError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    Ok(pubsub)
}

/// Runs until the subscription's stream ends.
async fn forward(mut pubsub: PubSub, registry: &ConnectionRegistry) {
    let mut stream = pubsub.on_message();

    while let Some(msg) = stream.next().await {
        let payload = match msg.get_payload::<String>() {
            Ok(p) => p,
            Err(e) => {
                error!(error = ?e, "failed to read relay payload");
                continue;
            }
        };

        let event: ContentEvent = match serde_json::from_str(&payload) {
            Ok(event) => event,
            Err(e) => {
                error!(error = ?e, payload = %payload, "dropping malformed relay event");
                continue;
            }
        };

        registry.broadcast(event.kind(), payload).await;
    }
}

/// Doubles from 500 ms, capped at 30 s.
fn resubscribe_delay(attempt: u32) -> Duration {
    RESUBSCRIBE_BASE
        .checked_mul(1u32 << attempt.min(16))
        .map_or(RESUBSCRIBE_MAX, |delay| delay.min(RESUBSCRIBE_MAX))
}
