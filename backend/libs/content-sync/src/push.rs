use crate::api::ContentApi;
use crate::session::SyncSession;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use content_model::{ContentEvent, ContentKind, Credential};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PushError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid credential header")]
    InvalidHeader,
}

/// Live subscription to one content kind.
///
/// Frames are decoded on a background task and handed over through a
/// channel. Dropping the feed closes the connection.
pub struct PushFeed {
    kind: ContentKind,
    events: mpsc::UnboundedReceiver<ContentEvent>,
    reader: JoinHandle<()>,
}

impl PushFeed {
    /// `ws_base` is the service root, e.g. `ws://localhost:8080`.
    pub async fn connect(
        ws_base: &str,
        kind: ContentKind,
        credential: &Credential,
    ) -> Result<Self, PushError> {
        let url = format!(
            "{}{}/realtime/{}",
            ws_base.trim_end_matches('/'),
            crate::api::API_PREFIX,
            kind
        );
        let mut request = url.as_str().into_client_request()?;
        let token = STANDARD.encode(format!("{}:{}", credential.phone, credential.access_code));
        let header =
            HeaderValue::from_str(&format!("Basic {}", token)).map_err(|_| PushError::InvalidHeader)?;
        request.headers_mut().insert(AUTHORIZATION, header);

        let (stream, _) = tokio_tungstenite::connect_async(request).await?;
        info!(kind = %kind, "push feed connected");

        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            let (mut sink, mut frames) = stream.split();
            while let Some(frame) = frames.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ContentEvent>(&text) {
                        Ok(event) => {
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(err) => warn!(error = %err, "undecodable push frame"),
                    },
                    Ok(Message::Ping(payload)) => {
                        if sink.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "push feed read failed");
                        break;
                    }
                }
            }
            debug!(kind = %kind, "push feed reader finished");
        });

        Ok(Self {
            kind,
            events: rx,
            reader,
        })
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// `None` once the connection is gone.
    pub async fn next(&mut self) -> Option<ContentEvent> {
        self.events.recv().await
    }

    /// Apply every event to `session` until the connection closes.
    pub async fn pump_into<A: ContentApi>(mut self, session: Arc<Mutex<SyncSession<A>>>) {
        while let Some(event) = self.next().await {
            session.lock().await.apply_event(event);
        }
        info!(kind = %self.kind, "push feed closed");
    }
}

impl Drop for PushFeed {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
