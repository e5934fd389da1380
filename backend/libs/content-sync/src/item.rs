use chrono::{DateTime, Utc};
use content_model::{ChatMessage, ContentEvent, ContentItem, ContentKind, Post, Reply};

/// An item a [`Timeline`](crate::Timeline) can hold.
pub trait SyncItem: Clone + Send + 'static {
    const KIND: ContentKind;

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn author(&self) -> &str;
    fn content(&self) -> &str;
    fn set_content(&mut self, content: String);
    fn created_at(&self) -> DateTime<Utc>;

    /// Narrow a tagged item to this kind.
    fn from_item(item: ContentItem) -> Option<Self>;

    /// Called when an authoritative version replaces `previous`; carries over
    /// state that only exists locally.
    fn keep_local(&mut self, _previous: &Self) {}
}

impl SyncItem for Post {
    const KIND: ContentKind = ContentKind::Post;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn set_content(&mut self, content: String) {
        self.content = content;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_item(item: ContentItem) -> Option<Self> {
        match item {
            ContentItem::Post(post) => Some(post),
            _ => None,
        }
    }

    /// Provisional replies stay until their own request settles, unless the
    /// server copy already lists the same reply.
    fn keep_local(&mut self, previous: &Self) {
        for reply in previous.replies.iter().filter(|r| r.id < 0) {
            let listed = self
                .replies
                .iter()
                .any(|r| r.id > 0 && r.author == reply.author && r.content == reply.content);
            if !listed {
                let key = (reply.created_at, reply.id);
                let idx = self.replies.partition_point(|r| (r.created_at, r.id) < key);
                self.replies.insert(idx, reply.clone());
            }
        }
    }
}

impl SyncItem for Reply {
    const KIND: ContentKind = ContentKind::Reply;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn set_content(&mut self, content: String) {
        self.content = content;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_item(item: ContentItem) -> Option<Self> {
        match item {
            ContentItem::Reply(reply) => Some(reply),
            _ => None,
        }
    }
}

impl SyncItem for ChatMessage {
    const KIND: ContentKind = ContentKind::Chat;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn set_content(&mut self, content: String) {
        self.content = content;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_item(item: ContentItem) -> Option<Self> {
        match item {
            ContentItem::Chat(message) => Some(message),
            _ => None,
        }
    }
}

/// Authoritative change for a single timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent<T> {
    Created(T),
    Updated(T),
    Deleted(i64),
}

impl<T: SyncItem> SyncEvent<T> {
    /// Returns `None` when the event belongs to another kind.
    pub fn from_content_event(event: ContentEvent) -> Option<Self> {
        match event {
            ContentEvent::Created { item } => T::from_item(item).map(SyncEvent::Created),
            ContentEvent::Updated { item } => T::from_item(item).map(SyncEvent::Updated),
            ContentEvent::Deleted { kind, id, .. } if kind == T::KIND => Some(SyncEvent::Deleted(id)),
            ContentEvent::Deleted { .. } => None,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            SyncEvent::Created(item) | SyncEvent::Updated(item) => item.id(),
            SyncEvent::Deleted(id) => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap()
    }

    fn reply(id: i64, content: &str, offset_secs: i64) -> Reply {
        Reply {
            id,
            post_id: 1,
            author: "Kay".to_string(),
            content: content.to_string(),
            created_at: t0() + chrono::Duration::seconds(offset_secs),
            edit_count: 0,
        }
    }

    fn post(replies: Vec<Reply>) -> Post {
        Post {
            id: 1,
            author: "Steph".to_string(),
            content: "garden update".to_string(),
            created_at: t0(),
            edit_count: 0,
            media: None,
            replies,
        }
    }

    #[test]
    fn test_post_keeps_provisional_replies_on_replace() {
        let shown = post(vec![reply(4, "nice", 1), reply(-1, "tomatoes?", 3), reply(-2, "wow", 5)]);
        let mut incoming = post(vec![reply(4, "nice", 1), reply(9, "wow", 5)]);

        incoming.keep_local(&shown);
        let ids: Vec<i64> = incoming.replies.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, -1, 9]);
    }

    fn message(id: i64) -> ChatMessage {
        ChatMessage {
            id,
            author: "Kay".to_string(),
            content: "hi".to_string(),
            created_at: Utc::now(),
            edit_count: 0,
        }
    }

    #[test]
    fn test_event_narrowing_by_kind() {
        let event = ContentEvent::created(message(3));
        assert_eq!(
            SyncEvent::<ChatMessage>::from_content_event(event.clone()).map(|e| e.id()),
            Some(3)
        );
        assert!(SyncEvent::<Post>::from_content_event(event).is_none());

        let deleted = ContentEvent::Deleted {
            kind: ContentKind::Post,
            id: 9,
            post_id: None,
        };
        assert!(SyncEvent::<ChatMessage>::from_content_event(deleted.clone()).is_none());
        assert_eq!(
            SyncEvent::<Post>::from_content_event(deleted),
            Some(SyncEvent::Deleted(9))
        );
    }
}
