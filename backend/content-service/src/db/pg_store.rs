use super::{chat_repo, post_repo, reply_repo, ContentStore, EditGuard, StoreError, UpdateOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use content_model::{ChatMessage, ContentItem, ContentKind, Draft, Post, Reply};
use sqlx::PgPool;
use std::collections::HashMap;

/// [`ContentStore`] over the Postgres content tables.
#[derive(Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn exists(&self, kind: ContentKind, id: i64) -> Result<bool, StoreError> {
        Ok(self.find(kind, id).await?.is_some())
    }
}

fn reply_insert_error(post_id: i64, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_foreign_key_violation() {
            return StoreError::ParentMissing(post_id);
        }
    }
    StoreError::from(err)
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn insert_post(
        &self,
        author: &str,
        draft: &Draft,
        created_at: DateTime<Utc>,
    ) -> Result<Post, StoreError> {
        let row = post_repo::insert_post(
            &self.pool,
            author,
            &draft.content,
            draft.media.as_ref(),
            created_at,
        )
        .await?;
        Ok(row.into_post(Vec::new()))
    }

    async fn insert_reply(
        &self,
        post_id: i64,
        author: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Reply, StoreError> {
        reply_repo::insert_reply(&self.pool, post_id, author, content, created_at)
            .await
            .map(Reply::from)
            .map_err(|err| reply_insert_error(post_id, err))
    }

    async fn insert_chat(
        &self,
        author: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<ChatMessage, StoreError> {
        let row = chat_repo::insert_message(&self.pool, author, content, created_at).await?;
        Ok(row.into())
    }

    async fn find(&self, kind: ContentKind, id: i64) -> Result<Option<ContentItem>, StoreError> {
        let item = match kind {
            ContentKind::Post => post_repo::find_post(&self.pool, id)
                .await?
                .map(|row| ContentItem::Post(row.into_post(Vec::new()))),
            ContentKind::Reply => reply_repo::find_reply(&self.pool, id)
                .await?
                .map(|row| ContentItem::Reply(row.into())),
            ContentKind::Chat => chat_repo::find_message(&self.pool, id)
                .await?
                .map(|row| ContentItem::Chat(row.into())),
        };
        Ok(item)
    }

    async fn update_content(
        &self,
        kind: ContentKind,
        id: i64,
        content: &str,
        guard: EditGuard,
    ) -> Result<UpdateOutcome, StoreError> {
        let increment = guard.increment();
        let expected = guard.expected_edit_count;

        let updated = match kind {
            ContentKind::Post => {
                post_repo::update_post_content(&self.pool, id, content, increment, expected)
                    .await?
                    .map(|row| ContentItem::Post(row.into_post(Vec::new())))
            }
            ContentKind::Reply => {
                reply_repo::update_reply_content(&self.pool, id, content, increment, expected)
                    .await?
                    .map(|row| ContentItem::Reply(row.into()))
            }
            ContentKind::Chat => {
                chat_repo::update_message_content(&self.pool, id, content, increment, expected)
                    .await?
                    .map(|row| ContentItem::Chat(row.into()))
            }
        };

        match updated {
            Some(item) => Ok(UpdateOutcome::Updated(item)),
            None if self.exists(kind, id).await? => Ok(UpdateOutcome::Conflict),
            None => Ok(UpdateOutcome::Missing),
        }
    }

    async fn delete(&self, kind: ContentKind, id: i64) -> Result<bool, StoreError> {
        let deleted = match kind {
            ContentKind::Post => post_repo::delete_post(&self.pool, id).await?,
            ContentKind::Reply => reply_repo::delete_reply(&self.pool, id).await?,
            ContentKind::Chat => chat_repo::delete_message(&self.pool, id).await?,
        };
        Ok(deleted)
    }

    async fn list_recent(
        &self,
        kind: ContentKind,
        limit: i64,
    ) -> Result<Vec<ContentItem>, StoreError> {
        match kind {
            ContentKind::Post => {
                let mut rows = post_repo::recent_posts(&self.pool, limit).await?;
                rows.reverse();

                let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
                let mut replies: HashMap<i64, Vec<Reply>> = HashMap::new();
                for row in reply_repo::replies_for_posts(&self.pool, &ids).await? {
                    replies.entry(row.post_id).or_default().push(row.into());
                }

                Ok(rows
                    .into_iter()
                    .map(|row| {
                        let own = replies.remove(&row.id).unwrap_or_default();
                        ContentItem::Post(row.into_post(own))
                    })
                    .collect())
            }
            ContentKind::Reply => {
                let mut rows = reply_repo::recent_replies(&self.pool, limit).await?;
                rows.reverse();
                Ok(rows
                    .into_iter()
                    .map(|row| ContentItem::Reply(row.into()))
                    .collect())
            }
            ContentKind::Chat => {
                let mut rows = chat_repo::recent_messages(&self.pool, limit).await?;
                rows.reverse();
                Ok(rows
                    .into_iter()
                    .map(|row| ContentItem::Chat(row.into()))
                    .collect())
            }
        }
    }

    async fn list_replies(&self, post_id: i64) -> Result<Vec<Reply>, StoreError> {
        let rows = reply_repo::replies_for_post(&self.pool, post_id).await?;
        Ok(rows.into_iter().map(Reply::from).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
