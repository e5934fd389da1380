/// HTTP handlers for the content endpoints
///
/// - Posts: create, recent feed, replies
/// - Chat: send, recent history
/// - Content: edit and delete any kind by id
/// - Media: attachment upload
/// - Realtime: distribution mode and WebSocket subscriptions
///
/// All routes require a member credential; see [`crate::middleware::MemberCredential`].
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub mod chat;
pub mod content;
pub mod media;
pub mod posts;
pub mod realtime;

pub use chat::{recent_chat, send_chat_message};
pub use content::{delete_item, edit_item};
pub use media::upload_media;
pub use posts::{create_post, create_reply, list_replies, recent_posts};
pub use realtime::{realtime_info, subscribe};

/// Error body shared by every endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
    /// Present on 403: `unauthorized`, `edit-limit-reached`,
    /// `edit-window-expired` or `delete-window-expired`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RecentQuery {
    /// Number of items, clamped to the configured maximum
    pub limit: Option<i64>,
}
