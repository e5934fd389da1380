/// Business logic layer for the content service
///
/// - `content`: the single write path for posts, replies and chat
/// - `identity`: credential → member identity
/// - `media`: attachment upload to object storage
pub mod content;
pub mod identity;
pub mod media;

pub use content::{ContentService, ListLimits};
pub use identity::{
    AccessCode, IdentityError, IdentityResolver, PgIdentityResolver, StaticIdentityResolver,
};
pub use media::{BlobUploader, DisabledBlobUploader, S3BlobUploader, UploadError};
