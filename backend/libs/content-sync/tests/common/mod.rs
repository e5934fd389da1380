#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use content_model::{
    ChatMessage, ContentEvent, ContentItem, ContentKind, DenyReason, DistributionMode, Draft, Post,
    RealtimeInfo, Reply,
};
use content_sync::{ApiError, ContentApi};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap()
}

pub fn chat(id: i64, author: &str, content: &str, offset_secs: i64) -> ChatMessage {
    ChatMessage {
        id,
        author: author.to_string(),
        content: content.to_string(),
        created_at: t0() + Duration::seconds(offset_secs),
        edit_count: 0,
    }
}

pub enum Failure {
    Deny(DenyReason),
    Unavailable,
    /// Never answers; the caller's timeout has to fire.
    Hang,
}

#[derive(Default)]
struct State {
    posts: Vec<Post>,
    replies: Vec<Reply>,
    chat: Vec<ChatMessage>,
    next_id: i64,
    failures: VecDeque<Failure>,
    events: Vec<ContentEvent>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory stand-in for the content service. Every successful mutation is
/// also recorded as the event the service would have pushed.
pub struct FakeApi {
    author: String,
    state: Mutex<State>,
}

impl FakeApi {
    pub fn new(author: &str) -> Arc<Self> {
        Arc::new(Self {
            author: author.to_string(),
            state: Mutex::new(State::default()),
        })
    }

    pub fn fail_next(&self, failure: Failure) {
        self.state.lock().unwrap().failures.push_back(failure);
    }

    pub fn drain_events(&self) -> Vec<ContentEvent> {
        std::mem::take(&mut self.state.lock().unwrap().events)
    }

    /// Someone else posts to the chat.
    pub fn seed_chat(&self, author: &str, content: &str) -> ChatMessage {
        let mut state = self.state.lock().unwrap();
        let message = ChatMessage {
            id: state.next_id(),
            author: author.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
            edit_count: 0,
        };
        state.chat.push(message.clone());
        state.events.push(ContentEvent::created(message.clone()));
        message
    }

    /// An item disappears server-side without this client's involvement.
    pub fn remove_chat(&self, id: i64) {
        let mut state = self.state.lock().unwrap();
        state.chat.retain(|m| m.id != id);
    }

    async fn gate(&self) -> Result<(), ApiError> {
        let failure = self.state.lock().unwrap().failures.pop_front();
        match failure {
            None => Ok(()),
            Some(Failure::Deny(reason)) => Err(ApiError::Denied(reason)),
            Some(Failure::Unavailable) => Err(ApiError::Unavailable("store down".to_string())),
            Some(Failure::Hang) => {
                tokio::time::sleep(std::time::Duration::from_secs(3_600)).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ContentApi for FakeApi {
    async fn create_post(&self, draft: &Draft) -> Result<Post, ApiError> {
        self.gate().await?;
        let mut state = self.state.lock().unwrap();
        let post = Post {
            id: state.next_id(),
            author: self.author.clone(),
            content: draft.content.clone(),
            created_at: Utc::now(),
            edit_count: 0,
            media: draft.media.clone(),
            replies: Vec::new(),
        };
        state.posts.push(post.clone());
        state.events.push(ContentEvent::created(post.clone()));
        Ok(post)
    }

    async fn create_reply(&self, post_id: i64, draft: &Draft) -> Result<Reply, ApiError> {
        self.gate().await?;
        let mut state = self.state.lock().unwrap();
        if !state.posts.iter().any(|p| p.id == post_id) {
            return Err(ApiError::NotFound(format!("post {} not found", post_id)));
        }
        let reply = Reply {
            id: state.next_id(),
            post_id,
            author: self.author.clone(),
            content: draft.content.clone(),
            created_at: Utc::now(),
            edit_count: 0,
        };
        state.replies.push(reply.clone());
        state.events.push(ContentEvent::created(reply.clone()));
        Ok(reply)
    }

    async fn send_chat_message(&self, text: &str) -> Result<ChatMessage, ApiError> {
        self.gate().await?;
        let mut state = self.state.lock().unwrap();
        let message = ChatMessage {
            id: state.next_id(),
            author: self.author.clone(),
            content: text.to_string(),
            created_at: Utc::now(),
            edit_count: 0,
        };
        state.chat.push(message.clone());
        state.events.push(ContentEvent::created(message.clone()));
        Ok(message)
    }

    async fn edit_item(
        &self,
        kind: ContentKind,
        id: i64,
        content: &str,
    ) -> Result<ContentItem, ApiError> {
        self.gate().await?;
        let mut state = self.state.lock().unwrap();
        let item = match kind {
            ContentKind::Post => state.posts.iter_mut().find(|p| p.id == id).map(|p| {
                p.content = content.to_string();
                p.edit_count += 1;
                ContentItem::from(p.clone())
            }),
            ContentKind::Reply => state.replies.iter_mut().find(|r| r.id == id).map(|r| {
                r.content = content.to_string();
                r.edit_count += 1;
                ContentItem::from(r.clone())
            }),
            ContentKind::Chat => state.chat.iter_mut().find(|m| m.id == id).map(|m| {
                m.content = content.to_string();
                m.edit_count += 1;
                ContentItem::from(m.clone())
            }),
        };
        let item = item.ok_or_else(|| ApiError::NotFound(format!("{} {} not found", kind, id)))?;
        state.events.push(ContentEvent::updated(item.clone()));
        Ok(item)
    }

    async fn delete_item(&self, kind: ContentKind, id: i64) -> Result<(), ApiError> {
        self.gate().await?;
        let mut state = self.state.lock().unwrap();
        let post_id = match kind {
            ContentKind::Post => {
                state.posts.retain(|p| p.id != id);
                state.replies.retain(|r| r.post_id != id);
                None
            }
            ContentKind::Reply => {
                let post_id = state.replies.iter().find(|r| r.id == id).map(|r| r.post_id);
                state.replies.retain(|r| r.id != id);
                post_id
            }
            ContentKind::Chat => {
                state.chat.retain(|m| m.id != id);
                None
            }
        };
        state.events.push(ContentEvent::Deleted { kind, id, post_id });
        Ok(())
    }

    async fn list_recent(
        &self,
        kind: ContentKind,
        _limit: Option<u32>,
    ) -> Result<Vec<ContentItem>, ApiError> {
        self.gate().await?;
        let state = self.state.lock().unwrap();
        Ok(match kind {
            ContentKind::Post => state
                .posts
                .iter()
                .cloned()
                .map(|mut post| {
                    post.replies = state
                        .replies
                        .iter()
                        .filter(|r| r.post_id == post.id)
                        .cloned()
                        .collect();
                    ContentItem::from(post)
                })
                .collect(),
            ContentKind::Chat => state.chat.iter().cloned().map(ContentItem::from).collect(),
            ContentKind::Reply => Vec::new(),
        })
    }

    async fn realtime_config(&self) -> Result<RealtimeInfo, ApiError> {
        Ok(RealtimeInfo {
            mode: DistributionMode::Poll,
            poll_interval_ms: 2_000,
        })
    }
}
