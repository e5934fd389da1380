use crate::api::{ApiError, ContentApi};
use crate::item::{SyncEvent, SyncItem};
use crate::timeline::{
    PendingId, SnapshotSummary, Timeline, Tombstones, DEFAULT_MATCH_TOLERANCE_SECS,
};
use chrono::{DateTime, Utc};
use content_model::{ChatMessage, ContentEvent, ContentItem, ContentKind, Draft, Post, Reply};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A local change that is already shown and still waits on the service.
///
/// Created by the `propose_*` methods of [`SyncSession`], sent with
/// [`Proposal::send`] and handed back to [`SyncSession::settle`].
#[derive(Debug, Clone)]
pub struct Proposal {
    change: Change,
}

#[derive(Debug, Clone)]
enum Change {
    Post {
        draft: Draft,
        pending: PendingId,
    },
    Chat {
        text: String,
        pending: PendingId,
    },
    Reply {
        post_id: i64,
        draft: Draft,
        temp_id: i64,
    },
    Edit {
        kind: ContentKind,
        id: i64,
        content: String,
        pending: Option<PendingId>,
        /// Reply content before the local edit.
        previous_reply: Option<String>,
    },
    Delete {
        kind: ContentKind,
        id: i64,
        pending: Option<PendingId>,
        removed_reply: Option<Reply>,
    },
}

/// The service's answer to a [`Proposal`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Post(Post),
    Reply(Reply),
    Chat(ChatMessage),
    Edited(ContentItem),
    Deleted,
}

impl Proposal {
    /// Issue the request. Borrows nothing from the session, so a shared
    /// session stays unlocked while this runs.
    pub async fn send<A>(&self, api: &A, timeout: Duration) -> Result<Outcome, ApiError>
    where
        A: ContentApi + ?Sized,
    {
        match &self.change {
            Change::Post { draft, .. } => within(timeout, api.create_post(draft))
                .await
                .map(Outcome::Post),
            Change::Chat { text, .. } => within(timeout, api.send_chat_message(text))
                .await
                .map(Outcome::Chat),
            Change::Reply { post_id, draft, .. } => {
                within(timeout, api.create_reply(*post_id, draft))
                    .await
                    .map(Outcome::Reply)
            }
            Change::Edit {
                kind, id, content, ..
            } => within(timeout, api.edit_item(*kind, *id, content))
                .await
                .map(Outcome::Edited),
            Change::Delete { kind, id, .. } => within(timeout, api.delete_item(*kind, *id))
                .await
                .map(|()| Outcome::Deleted),
        }
    }
}

/// Propose under the lock, send with the lock released, settle under the
/// lock again.
pub async fn submit_shared<A, F>(
    session: &Mutex<SyncSession<A>>,
    propose: F,
) -> Result<Outcome, ApiError>
where
    A: ContentApi,
    F: FnOnce(&mut SyncSession<A>) -> Proposal,
{
    let (proposal, api, timeout) = {
        let mut session = session.lock().await;
        let proposal = propose(&mut session);
        (proposal, session.api(), session.request_timeout)
    };
    let result = proposal.send(api.as_ref(), timeout).await;
    session.lock().await.settle(proposal, result)
}

/// One member's synchronized view of the feed and the chat.
///
/// Replies live inside their parent post, so the post timeline carries them.
pub struct SyncSession<A> {
    api: Arc<A>,
    author: String,
    posts: Timeline<Post>,
    chat: Timeline<ChatMessage>,
    request_timeout: Duration,
    deleted_replies: Tombstones,
    /// Replies hidden by a delete that has not settled yet.
    hidden_replies: HashSet<i64>,
    next_provisional_reply: i64,
    notices: Vec<String>,
}

impl<A: ContentApi> SyncSession<A> {
    /// `author` is the member's display name, used on provisional items.
    pub fn new(api: Arc<A>, author: impl Into<String>) -> Self {
        Self {
            api,
            author: author.into(),
            posts: Timeline::new(),
            chat: Timeline::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            deleted_replies: Tombstones::default(),
            hidden_replies: HashSet::new(),
            next_provisional_reply: 0,
            notices: Vec::new(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn api(&self) -> Arc<A> {
        Arc::clone(&self.api)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn posts(&self) -> &Timeline<Post> {
        &self.posts
    }

    pub fn chat(&self) -> &Timeline<ChatMessage> {
        &self.chat
    }

    /// Rolled-back changes since the last call, oldest first.
    pub fn take_notices(&mut self) -> Vec<String> {
        let mut notices: Vec<String> = self
            .posts
            .take_notices()
            .into_iter()
            .chain(self.chat.take_notices())
            .map(|notice| notice.message)
            .collect();
        notices.append(&mut self.notices);
        notices
    }

    // ---- propose ----

    pub fn propose_post(&mut self, draft: Draft) -> Proposal {
        let now = Utc::now();
        let provisional = Post {
            id: 0,
            author: self.author.clone(),
            content: draft.content.clone(),
            created_at: now,
            edit_count: 0,
            media: draft.media.clone(),
            replies: Vec::new(),
        };
        let pending = self.posts.propose_create(provisional, now);
        Proposal {
            change: Change::Post { draft, pending },
        }
    }

    pub fn propose_chat(&mut self, text: impl Into<String>) -> Proposal {
        let text = text.into();
        let now = Utc::now();
        let provisional = ChatMessage {
            id: 0,
            author: self.author.clone(),
            content: text.clone(),
            created_at: now,
            edit_count: 0,
        };
        let pending = self.chat.propose_create(provisional, now);
        Proposal {
            change: Change::Chat { text, pending },
        }
    }

    pub fn propose_reply(&mut self, post_id: i64, draft: Draft) -> Proposal {
        self.next_provisional_reply -= 1;
        let temp_id = self.next_provisional_reply;
        let provisional = Reply {
            id: temp_id,
            post_id,
            author: self.author.clone(),
            content: draft.content.clone(),
            created_at: Utc::now(),
            edit_count: 0,
        };
        self.posts
            .modify(post_id, |post| insert_reply(&mut post.replies, provisional));
        Proposal {
            change: Change::Reply {
                post_id,
                draft,
                temp_id,
            },
        }
    }

    pub fn propose_edit(
        &mut self,
        kind: ContentKind,
        id: i64,
        content: impl Into<String>,
    ) -> Proposal {
        let content = content.into();
        let now = Utc::now();
        let (pending, previous_reply) = match kind {
            ContentKind::Post => (self.posts.propose_edit(id, content.clone(), now), None),
            ContentKind::Chat => (self.chat.propose_edit(id, content.clone(), now), None),
            ContentKind::Reply => {
                let previous = self.find_reply(id).map(|reply| reply.content.clone());
                if previous.is_some() {
                    let replacement = content.clone();
                    self.posts.modify_each(|post| {
                        for reply in post.replies.iter_mut().filter(|r| r.id == id) {
                            reply.content = replacement.clone();
                        }
                    });
                }
                (None, previous)
            }
        };
        Proposal {
            change: Change::Edit {
                kind,
                id,
                content,
                pending,
                previous_reply,
            },
        }
    }

    pub fn propose_delete(&mut self, kind: ContentKind, id: i64) -> Proposal {
        let now = Utc::now();
        let (pending, removed_reply) = match kind {
            ContentKind::Post => (self.posts.propose_delete(id, now), None),
            ContentKind::Chat => (self.chat.propose_delete(id, now), None),
            ContentKind::Reply => {
                let removed = self.find_reply(id).cloned();
                if let Some(reply) = &removed {
                    self.hidden_replies.insert(id);
                    self.posts
                        .modify(reply.post_id, |post| post.replies.retain(|r| r.id != id));
                }
                (None, removed)
            }
        };
        Proposal {
            change: Change::Delete {
                kind,
                id,
                pending,
                removed_reply,
            },
        }
    }

    // ---- settle ----

    /// Confirm or roll back a proposal with the service's answer. Failures
    /// queue their reason as a notice and are returned unchanged.
    pub fn settle(
        &mut self,
        proposal: Proposal,
        result: Result<Outcome, ApiError>,
    ) -> Result<Outcome, ApiError> {
        let result = result.and_then(|outcome| check_outcome(&proposal.change, outcome));

        match proposal.change {
            Change::Post { pending, .. } => match &result {
                Ok(Outcome::Post(post)) => confirm_create(&mut self.posts, pending, post.clone()),
                _ => rollback(&mut self.posts, Some(pending), &result, &mut self.notices),
            },
            Change::Chat { pending, .. } => match &result {
                Ok(Outcome::Chat(message)) => {
                    confirm_create(&mut self.chat, pending, message.clone())
                }
                _ => rollback(&mut self.chat, Some(pending), &result, &mut self.notices),
            },
            Change::Reply {
                post_id, temp_id, ..
            } => {
                let deleted = &self.deleted_replies;
                self.posts.modify(post_id, |post| {
                    post.replies.retain(|reply| reply.id != temp_id);
                    if let Ok(Outcome::Reply(reply)) = &result {
                        if !deleted.contains(reply.id) {
                            upsert_reply(&mut post.replies, reply.clone());
                        }
                    }
                });
                if let Err(err) = &result {
                    self.notices.push(err.user_message());
                }
            }
            Change::Edit {
                kind: ContentKind::Reply,
                id,
                content,
                previous_reply,
                ..
            } => match &result {
                Ok(Outcome::Edited(ContentItem::Reply(reply))) => self.merge_reply(reply.clone()),
                _ => {
                    if let Some(previous) = previous_reply {
                        self.posts.modify_each(|post| {
                            for reply in post.replies.iter_mut().filter(|r| r.id == id) {
                                // Leave newer server content alone.
                                if reply.content == content {
                                    reply.content = previous.clone();
                                }
                            }
                        });
                    }
                    push_failure(&result, &mut self.notices);
                }
            },
            Change::Edit {
                kind: ContentKind::Post,
                pending,
                ..
            } => settle_edit(&mut self.posts, pending, &result, &mut self.notices),
            Change::Edit {
                kind: ContentKind::Chat,
                pending,
                ..
            } => settle_edit(&mut self.chat, pending, &result, &mut self.notices),
            Change::Delete {
                kind: ContentKind::Reply,
                id,
                removed_reply,
                ..
            } => {
                self.hidden_replies.remove(&id);
                match &result {
                    Ok(_) => self.remove_reply(id, removed_reply.map(|r| r.post_id)),
                    Err(_) => {
                        if let Some(reply) = removed_reply {
                            self.merge_reply(reply);
                        }
                        push_failure(&result, &mut self.notices);
                    }
                }
            }
            Change::Delete {
                kind: ContentKind::Post,
                id,
                pending,
                ..
            } => settle_delete(&mut self.posts, id, pending, &result, &mut self.notices),
            Change::Delete {
                kind: ContentKind::Chat,
                id,
                pending,
                ..
            } => settle_delete(&mut self.chat, id, pending, &result, &mut self.notices),
        }
        result
    }

    // ---- submissions ----

    /// Propose, send and settle in one go. Holds `&mut self` for the whole
    /// request; share a session through [`submit_shared`] instead.
    pub async fn submit(&mut self, proposal: Proposal) -> Result<Outcome, ApiError> {
        let api = self.api();
        let result = proposal.send(api.as_ref(), self.request_timeout).await;
        self.settle(proposal, result)
    }

    pub async fn submit_post(&mut self, draft: Draft) -> Result<Post, ApiError> {
        let proposal = self.propose_post(draft);
        match self.submit(proposal).await? {
            Outcome::Post(post) => Ok(post),
            _ => Err(mismatched()),
        }
    }

    pub async fn submit_chat(&mut self, text: &str) -> Result<ChatMessage, ApiError> {
        let proposal = self.propose_chat(text);
        match self.submit(proposal).await? {
            Outcome::Chat(message) => Ok(message),
            _ => Err(mismatched()),
        }
    }

    pub async fn submit_reply(&mut self, post_id: i64, draft: Draft) -> Result<Reply, ApiError> {
        let proposal = self.propose_reply(post_id, draft);
        match self.submit(proposal).await? {
            Outcome::Reply(reply) => Ok(reply),
            _ => Err(mismatched()),
        }
    }

    pub async fn edit(
        &mut self,
        kind: ContentKind,
        id: i64,
        content: &str,
    ) -> Result<ContentItem, ApiError> {
        let proposal = self.propose_edit(kind, id, content);
        match self.submit(proposal).await? {
            Outcome::Edited(item) => Ok(item),
            _ => Err(mismatched()),
        }
    }

    pub async fn delete(&mut self, kind: ContentKind, id: i64) -> Result<(), ApiError> {
        let proposal = self.propose_delete(kind, id);
        self.submit(proposal).await.map(|_| ())
    }

    // ---- authoritative state ----

    pub fn apply_event(&mut self, event: ContentEvent) {
        debug!(kind = %event.kind(), id = event.id(), event = event.label(), "applying event");
        match (event.kind(), event) {
            (ContentKind::Post, event) => {
                if let Some(event) = SyncEvent::<Post>::from_content_event(event) {
                    let event = match event {
                        SyncEvent::Created(mut post) => {
                            self.scrub_replies(&mut post);
                            SyncEvent::Created(post)
                        }
                        SyncEvent::Updated(mut post) => {
                            self.scrub_replies(&mut post);
                            SyncEvent::Updated(post)
                        }
                        deleted => deleted,
                    };
                    self.posts.apply(event);
                }
            }
            (ContentKind::Chat, event) => {
                if let Some(event) = SyncEvent::<ChatMessage>::from_content_event(event) {
                    self.chat.apply(event);
                }
            }
            (ContentKind::Reply, ContentEvent::Deleted { id, post_id, .. }) => {
                self.remove_reply(id, post_id);
            }
            (ContentKind::Reply, ContentEvent::Created { item })
            | (ContentKind::Reply, ContentEvent::Updated { item }) => {
                if let Some(reply) = Reply::from_item(item) {
                    self.merge_reply(reply);
                }
            }
        }
    }

    pub fn apply_snapshot(&mut self, kind: ContentKind, items: Vec<ContentItem>) -> SnapshotSummary {
        match kind {
            ContentKind::Post => {
                let posts: Vec<Post> = items
                    .into_iter()
                    .filter_map(Post::from_item)
                    .map(|mut post| {
                        self.scrub_replies(&mut post);
                        post
                    })
                    .collect();
                self.posts.apply_snapshot(posts)
            }
            ContentKind::Chat => self
                .chat
                .apply_snapshot(items.into_iter().filter_map(ChatMessage::from_item).collect()),
            ContentKind::Reply => {
                warn!("ignoring reply snapshot; replies arrive with their post");
                SnapshotSummary::default()
            }
        }
    }

    /// Fetch both recent lists and merge them.
    pub async fn refresh(&mut self, limit: Option<u32>) -> Result<(), ApiError> {
        let api = self.api();
        let posts = within(self.request_timeout, api.list_recent(ContentKind::Post, limit)).await?;
        let chat = within(self.request_timeout, api.list_recent(ContentKind::Chat, limit)).await?;
        self.apply_snapshot(ContentKind::Post, posts);
        self.apply_snapshot(ContentKind::Chat, chat);
        Ok(())
    }

    /// Roll back local changes whose request outlived the request timeout.
    pub fn expire_pending(&mut self, now: DateTime<Utc>) -> usize {
        let timeout = chrono::Duration::milliseconds(self.request_timeout.as_millis() as i64);
        self.posts.expire_pending(now, timeout).len() + self.chat.expire_pending(now, timeout).len()
    }

    fn find_reply(&self, id: i64) -> Option<&Reply> {
        self.posts
            .items()
            .flat_map(|post| post.replies.iter())
            .find(|reply| reply.id == id)
    }

    /// Drop replies that are deleted, or hidden by a delete still in flight.
    fn scrub_replies(&self, post: &mut Post) {
        post.replies.retain(|r| {
            !self.deleted_replies.contains(r.id) && !self.hidden_replies.contains(&r.id)
        });
    }

    fn merge_reply(&mut self, reply: Reply) {
        if self.deleted_replies.contains(reply.id) || self.hidden_replies.contains(&reply.id) {
            return;
        }
        let post_id = reply.post_id;
        if !self.posts.modify(post_id, |post| upsert_reply(&mut post.replies, reply)) {
            debug!(post_id, "reply for a post that is not shown");
        }
    }

    fn remove_reply(&mut self, id: i64, post_id: Option<i64>) {
        self.deleted_replies.insert(id);
        match post_id {
            Some(post_id) => {
                self.posts
                    .modify(post_id, |post| post.replies.retain(|r| r.id != id));
            }
            None => self
                .posts
                .modify_each(|post| post.replies.retain(|r| r.id != id)),
        }
    }
}

async fn within<T, F>(timeout: Duration, call: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout),
    }
}

fn mismatched() -> ApiError {
    ApiError::Unexpected {
        status: 200,
        message: "response does not match the request".to_string(),
    }
}

fn check_outcome(change: &Change, outcome: Outcome) -> Result<Outcome, ApiError> {
    let matches = match (change, &outcome) {
        (Change::Post { .. }, Outcome::Post(_))
        | (Change::Chat { .. }, Outcome::Chat(_))
        | (Change::Reply { .. }, Outcome::Reply(_))
        | (Change::Delete { .. }, Outcome::Deleted) => true,
        (Change::Edit { kind, .. }, Outcome::Edited(item)) => item.kind() == *kind,
        _ => false,
    };
    if matches {
        Ok(outcome)
    } else {
        Err(mismatched())
    }
}

fn push_failure(result: &Result<Outcome, ApiError>, notices: &mut Vec<String>) {
    if let Err(err) = result {
        notices.push(err.user_message());
    }
}

fn confirm_create<T: SyncItem>(timeline: &mut Timeline<T>, pending: PendingId, item: T) {
    // Already expired: the stored item still belongs in the timeline.
    if !timeline.confirm_create(pending, item.clone()) {
        timeline.apply(SyncEvent::Created(item));
    }
}

/// Undo a failed change. Changes to items that were not shown only get a
/// notice.
fn rollback<T: SyncItem>(
    timeline: &mut Timeline<T>,
    pending: Option<PendingId>,
    result: &Result<Outcome, ApiError>,
    notices: &mut Vec<String>,
) {
    let Err(err) = result else {
        return;
    };
    match pending {
        Some(pending) => {
            timeline.rollback(pending, err.user_message());
        }
        None => notices.push(err.user_message()),
    }
}

fn settle_edit<T: SyncItem>(
    timeline: &mut Timeline<T>,
    pending: Option<PendingId>,
    result: &Result<Outcome, ApiError>,
    notices: &mut Vec<String>,
) {
    match result {
        Ok(Outcome::Edited(item)) => {
            if let Some(pending) = pending {
                timeline.confirm(pending);
            }
            if let Some(updated) = T::from_item(item.clone()) {
                timeline.apply(SyncEvent::Updated(updated));
            }
        }
        _ => rollback(timeline, pending, result, notices),
    }
}

fn settle_delete<T: SyncItem>(
    timeline: &mut Timeline<T>,
    id: i64,
    pending: Option<PendingId>,
    result: &Result<Outcome, ApiError>,
    notices: &mut Vec<String>,
) {
    match result {
        Ok(_) => {
            if !pending.map_or(false, |pending| timeline.confirm(pending)) {
                timeline.apply(SyncEvent::Deleted(id));
            }
        }
        Err(_) => rollback(timeline, pending, result, notices),
    }
}

/// Keeps replies oldest first. Only called for ids not already present.
fn insert_reply(replies: &mut Vec<Reply>, reply: Reply) {
    let key = (reply.created_at, reply.id);
    let idx = replies.partition_point(|r| (r.created_at, r.id) < key);
    replies.insert(idx, reply);
}

/// Overwrite by id, or adopt a provisional reply with the same author and
/// content, or insert in order.
fn upsert_reply(replies: &mut Vec<Reply>, reply: Reply) {
    let tolerance = chrono::Duration::seconds(DEFAULT_MATCH_TOLERANCE_SECS);
    let existing = replies.iter().position(|r| r.id == reply.id).or_else(|| {
        replies.iter().position(|r| {
            r.id < 0
                && r.author == reply.author
                && r.content == reply.content
                && (r.created_at - reply.created_at).abs() <= tolerance
        })
    });
    if let Some(idx) = existing {
        replies.remove(idx);
    }
    insert_reply(replies, reply);
}
