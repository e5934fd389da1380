//! Content store
//!
//! One table per content kind. [`ContentStore`] is the only write path;
//! [`PgContentStore`] backs production and [`MemoryContentStore`] backs tests
//! and `STORE_BACKEND=memory` runs.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use content_model::{ChatMessage, ContentItem, ContentKind, Draft, Post, Reply};
use sqlx::migrate::Migrator;
use thiserror::Error;

pub mod chat_repo;
pub mod member_repo;
pub mod memory;
pub mod pg_store;
pub mod post_repo;
pub mod reply_repo;

pub use memory::MemoryContentStore;
pub use pg_store::PgContentStore;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient: pool exhausted, connection lost, database down
    #[error("{0}")]
    Unavailable(String),

    #[error("parent post {0} does not exist")]
    ParentMissing(i64),

    #[error("{0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Write condition for a content update.
///
/// Author edits are written only if the edit count is still the one the
/// authorizer saw, so two racing edits cannot both spend the allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditGuard {
    pub bump_edit_count: bool,
    pub expected_edit_count: Option<i32>,
}

impl EditGuard {
    pub fn author(expected_edit_count: i32) -> Self {
        Self {
            bump_edit_count: true,
            expected_edit_count: Some(expected_edit_count),
        }
    }

    /// Administrator corrections leave the author's allowance untouched.
    pub fn admin() -> Self {
        Self {
            bump_edit_count: false,
            expected_edit_count: None,
        }
    }

    pub fn admits(&self, current_edit_count: i32) -> bool {
        self.expected_edit_count
            .map_or(true, |expected| expected == current_edit_count)
    }

    pub fn increment(&self) -> i32 {
        i32::from(self.bump_edit_count)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated(ContentItem),
    Missing,
    Conflict,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn insert_post(
        &self,
        author: &str,
        draft: &Draft,
        created_at: DateTime<Utc>,
    ) -> Result<Post, StoreError>;

    /// Fails with [`StoreError::ParentMissing`] when the post is gone.
    async fn insert_reply(
        &self,
        post_id: i64,
        author: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Reply, StoreError>;

    async fn insert_chat(
        &self,
        author: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<ChatMessage, StoreError>;

    /// Posts come back without replies.
    async fn find(&self, kind: ContentKind, id: i64) -> Result<Option<ContentItem>, StoreError>;

    async fn update_content(
        &self,
        kind: ContentKind,
        id: i64,
        content: &str,
        guard: EditGuard,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Deleting a post also deletes its replies. Returns whether a row went.
    async fn delete(&self, kind: ContentKind, id: i64) -> Result<bool, StoreError>;

    /// The `limit` most recent items, oldest first. Posts include replies.
    async fn list_recent(&self, kind: ContentKind, limit: i64)
        -> Result<Vec<ContentItem>, StoreError>;

    /// Oldest first.
    async fn list_replies(&self, post_id: i64) -> Result<Vec<Reply>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
