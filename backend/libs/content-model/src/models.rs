use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// The three content kinds. Each kind is stored separately, so ids are only
/// unique within a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Reply,
    Chat,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::Post, ContentKind::Reply, ContentKind::Chat];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Reply => "reply",
            ContentKind::Chat => "chat",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" | "posts" => Ok(ContentKind::Post),
            "reply" | "replies" => Ok(ContentKind::Reply),
            "chat" | "chats" | "message" | "messages" => Ok(ContentKind::Chat),
            other => Err(format!("unknown content kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Classify a MIME type such as `image/png`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let top = mime.split('/').next()?.trim();
        match top {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => Err(format!("unknown media kind '{}'", other)),
        }
    }
}

/// Opaque reference to an uploaded blob. Never re-validated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub url: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: i64,
    pub post_id: i64,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edit_count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edit_count: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRef>,
    /// Oldest first.
    #[serde(default)]
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edit_count: i32,
}

/// The fields the authorizer looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemMeta {
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub edit_count: i32,
}

/// Any stored item, tagged by kind on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentItem {
    Post(Post),
    Reply(Reply),
    Chat(ChatMessage),
}

impl ContentItem {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentItem::Post(_) => ContentKind::Post,
            ContentItem::Reply(_) => ContentKind::Reply,
            ContentItem::Chat(_) => ContentKind::Chat,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            ContentItem::Post(p) => p.id,
            ContentItem::Reply(r) => r.id,
            ContentItem::Chat(c) => c.id,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            ContentItem::Post(p) => &p.content,
            ContentItem::Reply(r) => &r.content,
            ContentItem::Chat(c) => &c.content,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            ContentItem::Post(p) => p.created_at,
            ContentItem::Reply(r) => r.created_at,
            ContentItem::Chat(c) => c.created_at,
        }
    }

    /// Parent post for replies.
    pub fn post_id(&self) -> Option<i64> {
        match self {
            ContentItem::Reply(r) => Some(r.post_id),
            _ => None,
        }
    }

    pub fn meta(&self) -> ItemMeta {
        let (author, created_at, edit_count) = match self {
            ContentItem::Post(p) => (&p.author, p.created_at, p.edit_count),
            ContentItem::Reply(r) => (&r.author, r.created_at, r.edit_count),
            ContentItem::Chat(c) => (&c.author, c.created_at, c.edit_count),
        };
        ItemMeta {
            author: author.clone(),
            created_at,
            edit_count,
        }
    }
}

impl From<Post> for ContentItem {
    fn from(post: Post) -> Self {
        ContentItem::Post(post)
    }
}

impl From<Reply> for ContentItem {
    fn from(reply: Reply) -> Self {
        ContentItem::Reply(reply)
    }
}

impl From<ChatMessage> for ContentItem {
    fn from(message: ChatMessage) -> Self {
        ContentItem::Chat(message)
    }
}

/// What a member submits. The author is never taken from the draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRef>,
}

impl Draft {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            media: None,
        }
    }
}
