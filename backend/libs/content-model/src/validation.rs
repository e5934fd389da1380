use crate::models::{ContentKind, Draft};
use thiserror::Error;

/// Posts and replies.
pub const MAX_POST_CHARS: usize = 250;
/// Chat is nominally unbounded; this keeps a single message practical.
pub const MAX_CHAT_CHARS: usize = 2_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("content must not be empty")]
    Empty,

    #[error("content is {actual} characters, limit is {limit}")]
    TooLong { limit: usize, actual: usize },

    #[error("media attachments are only supported on posts")]
    MediaNotAllowed,
}

pub fn max_chars(kind: ContentKind) -> usize {
    match kind {
        ContentKind::Post | ContentKind::Reply => MAX_POST_CHARS,
        ContentKind::Chat => MAX_CHAT_CHARS,
    }
}

/// Check replacement text for an edit. Edits never touch media, so the text
/// itself must be non-empty.
pub fn validate_content(kind: ContentKind, content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    check_length(kind, content)
}

/// Check a submission before any store access.
pub fn validate_draft(kind: ContentKind, draft: &Draft) -> Result<(), ValidationError> {
    if draft.media.is_some() && kind != ContentKind::Post {
        return Err(ValidationError::MediaNotAllowed);
    }
    if draft.content.trim().is_empty() && draft.media.is_none() {
        return Err(ValidationError::Empty);
    }
    check_length(kind, &draft.content)
}

fn check_length(kind: ContentKind, content: &str) -> Result<(), ValidationError> {
    let limit = max_chars(kind);
    let actual = content.chars().count();
    if actual > limit {
        return Err(ValidationError::TooLong { limit, actual });
    }
    Ok(())
}
