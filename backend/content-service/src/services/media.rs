/// Media upload
///
/// Post attachments are stored as objects and referenced by URL; the
/// content tables only ever hold the opaque URL string.
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use content_model::MediaKind;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    UnsupportedType(String),

    #[error("media uploads are disabled")]
    Disabled,

    #[error("upload failed: {0}")]
    Backend(String),
}

#[async_trait]
pub trait BlobUploader: Send + Sync {
    /// Store `bytes` and return the public URL.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        kind: MediaKind,
        content_type: &str,
    ) -> Result<String, UploadError>;
}

/// Object key extension for a content type. Only the common photo and
/// video formats are accepted.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        "video/webm" => Some("webm"),
        _ => None,
    }
}

pub struct S3BlobUploader {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3BlobUploader {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build from the ambient AWS configuration (env, profile, IMDS).
    pub async fn from_env(bucket: String, public_base_url: String) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket, public_base_url)
    }
}

#[async_trait]
impl BlobUploader for S3BlobUploader {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        kind: MediaKind,
        content_type: &str,
    ) -> Result<String, UploadError> {
        let ext = extension_for(content_type)
            .ok_or_else(|| UploadError::UnsupportedType(content_type.to_string()))?;
        let key = format!("media/{}.{}", Uuid::new_v4(), ext);
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| UploadError::Backend(e.to_string()))?;

        tracing::info!(key = %key, kind = kind.as_str(), size, "media uploaded");
        Ok(format!("{}/{}", self.public_base_url, key))
    }
}

/// Used when no bucket is configured.
pub struct DisabledBlobUploader;

#[async_trait]
impl BlobUploader for DisabledBlobUploader {
    async fn upload(
        &self,
        _bytes: Vec<u8>,
        _kind: MediaKind,
        _content_type: &str,
    ) -> Result<String, UploadError> {
        Err(UploadError::Disabled)
    }
}
