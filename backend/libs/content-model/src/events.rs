use crate::models::{ContentItem, ContentKind};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Realtime event pushed to subscribers of a content kind.
///
/// Delivery is at-least-once; receivers dedupe by `(kind, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentEvent {
    Created {
        item: ContentItem,
    },
    Updated {
        item: ContentItem,
    },
    #[serde(rename_all = "camelCase")]
    Deleted {
        kind: ContentKind,
        id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        post_id: Option<i64>,
    },
}

impl ContentEvent {
    pub fn created(item: impl Into<ContentItem>) -> Self {
        ContentEvent::Created { item: item.into() }
    }

    pub fn updated(item: impl Into<ContentItem>) -> Self {
        ContentEvent::Updated { item: item.into() }
    }

    pub fn deleted(item: &ContentItem) -> Self {
        ContentEvent::Deleted {
            kind: item.kind(),
            id: item.id(),
            post_id: item.post_id(),
        }
    }

    /// Topic the event is fanned out on.
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentEvent::Created { item } | ContentEvent::Updated { item } => item.kind(),
            ContentEvent::Deleted { kind, .. } => *kind,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            ContentEvent::Created { item } | ContentEvent::Updated { item } => item.id(),
            ContentEvent::Deleted { id, .. } => *id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContentEvent::Created { .. } => "created",
            ContentEvent::Updated { .. } => "updated",
            ContentEvent::Deleted { .. } => "deleted",
        }
    }
}

/// How a deployment delivers new content to connected viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DistributionMode {
    Push,
    Poll,
}

impl std::str::FromStr for DistributionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "push" | "websocket" | "ws" => Ok(DistributionMode::Push),
            "poll" | "polling" => Ok(DistributionMode::Poll),
            other => Err(format!("unknown realtime mode '{}'", other)),
        }
    }
}

/// Advertised to clients so they can pick push or poll at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInfo {
    pub mode: DistributionMode,
    pub poll_interval_ms: u64,
}
