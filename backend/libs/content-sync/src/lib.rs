//! Client-side synchronization for Hearth content
//!
//! - [`Timeline`]: optimistic local view of one content kind, reconciled
//!   against authoritative events and snapshots
//! - [`ContentApi`] / [`HttpContentApi`]: the content service over HTTP
//! - [`SyncSession`]: drives submissions through propose, call, then
//!   settle; [`submit_shared`] does so without holding a shared session's
//!   lock across the request
//! - [`poll_recent`] and [`PushFeed`]: the two ways authoritative state
//!   arrives

pub mod api;
pub mod item;
pub mod poller;
pub mod push;
pub mod session;
pub mod timeline;

pub use api::{ApiError, ContentApi, HttpContentApi};
pub use item::{SyncEvent, SyncItem};
pub use poller::{poll_recent, DEFAULT_POLL_INTERVAL};
pub use push::{PushError, PushFeed};
pub use session::{submit_shared, Outcome, Proposal, SyncSession, DEFAULT_REQUEST_TIMEOUT};
pub use timeline::{
    Entry, Merge, Notice, PendingId, SnapshotSummary, Timeline, DEFAULT_TOMBSTONE_CAPACITY,
};
