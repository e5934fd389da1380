use crate::api::ContentApi;
use crate::session::SyncSession;
use chrono::Utc;
use content_model::ContentKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Chat feels live at this rate without hammering the service.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);

/// Poll-mode distribution: refetch both recent lists every `every` and merge
/// them into the session until `shutdown` flips to `true`.
///
/// The session lock is only held while merging, never across a request.
pub async fn poll_recent<A>(
    session: Arc<Mutex<SyncSession<A>>>,
    every: Duration,
    limit: Option<u32>,
    mut shutdown: watch::Receiver<bool>,
) where
    A: ContentApi + 'static,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_ms = every.as_millis() as u64, "polling for recent content");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let api = session.lock().await.api();
        for kind in [ContentKind::Post, ContentKind::Chat] {
            match api.list_recent(kind, limit).await {
                Ok(items) => {
                    let summary = session.lock().await.apply_snapshot(kind, items);
                    debug!(
                        kind = %kind,
                        inserted = summary.inserted,
                        replaced = summary.replaced,
                        matched = summary.matched,
                        removed = summary.removed,
                        "merged snapshot"
                    );
                }
                Err(err) => warn!(kind = %kind, error = %err, "poll failed"),
            }
        }

        let expired = session.lock().await.expire_pending(Utc::now());
        if expired > 0 {
            warn!(expired, "rolled back requests that outlived the timeout");
        }
    }

    info!("poller stopped");
}
