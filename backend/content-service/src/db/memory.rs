use super::{ContentStore, EditGuard, StoreError, UpdateOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use content_model::{ChatMessage, ContentItem, ContentKind, Draft, Post, Reply};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    posts: BTreeMap<i64, Post>,
    replies: BTreeMap<i64, Reply>,
    chat: BTreeMap<i64, ChatMessage>,
    last_post_id: i64,
    last_reply_id: i64,
    last_chat_id: i64,
}

impl Tables {
    fn replies_of(&self, post_id: i64) -> Vec<Reply> {
        let mut replies: Vec<Reply> = self
            .replies
            .values()
            .filter(|reply| reply.post_id == post_id)
            .cloned()
            .collect();
        replies.sort_by_key(|reply| (reply.created_at, reply.id));
        replies
    }

    fn edit_count(&self, kind: ContentKind, id: i64) -> Option<i32> {
        match kind {
            ContentKind::Post => self.posts.get(&id).map(|p| p.edit_count),
            ContentKind::Reply => self.replies.get(&id).map(|r| r.edit_count),
            ContentKind::Chat => self.chat.get(&id).map(|c| c.edit_count),
        }
    }
}

/// In-process [`ContentStore`]. Ids are assigned per kind starting at 1.
#[derive(Default)]
pub struct MemoryContentStore {
    tables: RwLock<Tables>,
    offline: AtomicBool,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }
}

fn newest<T: Clone>(items: Vec<&T>, key: impl Fn(&T) -> (DateTime<Utc>, i64), limit: i64) -> Vec<T> {
    let mut items: Vec<T> = items.into_iter().cloned().collect();
    items.sort_by_key(|item| key(item));
    let keep = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
    let skip = items.len().saturating_sub(keep);
    items.into_iter().skip(skip).collect()
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn insert_post(
        &self,
        author: &str,
        draft: &Draft,
        created_at: DateTime<Utc>,
    ) -> Result<Post, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        tables.last_post_id += 1;
        let post = Post {
            id: tables.last_post_id,
            author: author.to_string(),
            content: draft.content.clone(),
            created_at,
            edit_count: 0,
            media: draft.media.clone(),
            replies: Vec::new(),
        };
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn insert_reply(
        &self,
        post_id: i64,
        author: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Reply, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&post_id) {
            return Err(StoreError::ParentMissing(post_id));
        }
        tables.last_reply_id += 1;
        let reply = Reply {
            id: tables.last_reply_id,
            post_id,
            author: author.to_string(),
            content: content.to_string(),
            created_at,
            edit_count: 0,
        };
        tables.replies.insert(reply.id, reply.clone());
        Ok(reply)
    }

    async fn insert_chat(
        &self,
        author: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<ChatMessage, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        tables.last_chat_id += 1;
        let message = ChatMessage {
            id: tables.last_chat_id,
            author: author.to_string(),
            content: content.to_string(),
            created_at,
            edit_count: 0,
        };
        tables.chat.insert(message.id, message.clone());
        Ok(message)
    }

    async fn find(&self, kind: ContentKind, id: i64) -> Result<Option<ContentItem>, StoreError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        let item = match kind {
            ContentKind::Post => tables.posts.get(&id).cloned().map(ContentItem::Post),
            ContentKind::Reply => tables.replies.get(&id).cloned().map(ContentItem::Reply),
            ContentKind::Chat => tables.chat.get(&id).cloned().map(ContentItem::Chat),
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
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let Some(current) = tables.edit_count(kind, id) else {
            return Ok(UpdateOutcome::Missing);
        };
        if !guard.admits(current) {
            return Ok(UpdateOutcome::Conflict);
        }

        let increment = guard.increment();
        let item = match kind {
            ContentKind::Post => tables.posts.get_mut(&id).map(|post| {
                post.content = content.to_string();
                post.edit_count += increment;
                ContentItem::Post(post.clone())
            }),
            ContentKind::Reply => tables.replies.get_mut(&id).map(|reply| {
                reply.content = content.to_string();
                reply.edit_count += increment;
                ContentItem::Reply(reply.clone())
            }),
            ContentKind::Chat => tables.chat.get_mut(&id).map(|message| {
                message.content = content.to_string();
                message.edit_count += increment;
                ContentItem::Chat(message.clone())
            }),
        };
        Ok(item.map_or(UpdateOutcome::Missing, UpdateOutcome::Updated))
    }

    async fn delete(&self, kind: ContentKind, id: i64) -> Result<bool, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let deleted = match kind {
            ContentKind::Post => {
                let removed = tables.posts.remove(&id).is_some();
                if removed {
                    tables.replies.retain(|_, reply| reply.post_id != id);
                }
                removed
            }
            ContentKind::Reply => tables.replies.remove(&id).is_some(),
            ContentKind::Chat => tables.chat.remove(&id).is_some(),
        };
        Ok(deleted)
    }

    async fn list_recent(
        &self,
        kind: ContentKind,
        limit: i64,
    ) -> Result<Vec<ContentItem>, StoreError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        let items = match kind {
            ContentKind::Post => newest(
                tables.posts.values().collect(),
                |p| (p.created_at, p.id),
                limit,
            )
            .into_iter()
            .map(|mut post| {
                post.replies = tables.replies_of(post.id);
                ContentItem::Post(post)
            })
            .collect(),
            ContentKind::Reply => newest(
                tables.replies.values().collect(),
                |r| (r.created_at, r.id),
                limit,
            )
            .into_iter()
            .map(ContentItem::Reply)
            .collect(),
            ContentKind::Chat => newest(
                tables.chat.values().collect(),
                |c| (c.created_at, c.id),
                limit,
            )
            .into_iter()
            .map(ContentItem::Chat)
            .collect(),
        };
        Ok(items)
    }

    async fn list_replies(&self, post_id: i64) -> Result<Vec<Reply>, StoreError> {
        self.check_online()?;
        Ok(self.tables.read().await.replies_of(post_id))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_online()
    }
}
