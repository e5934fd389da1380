//! Client side of the content service HTTP API

use async_trait::async_trait;
use content_model::{
    ChatMessage, ContentItem, ContentKind, Credential, DenyReason, Draft, Post, RealtimeInfo, Reply,
};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const API_PREFIX: &str = "/api/v1";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Denied(DenyReason),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("not signed in")]
    Unauthenticated,

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response {status}: {message}")]
    Unexpected { status: u16, message: String },
}

impl ApiError {
    /// Text shown to the user when a local change is rolled back. Deny
    /// reasons are passed through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Denied(reason) => reason.as_str().to_string(),
            other => other.to_string(),
        }
    }
}

/// Error body produced by the service.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    reason: Option<DenyReason>,
}

#[async_trait]
pub trait ContentApi: Send + Sync {
    async fn create_post(&self, draft: &Draft) -> Result<Post, ApiError>;

    async fn create_reply(&self, post_id: i64, draft: &Draft) -> Result<Reply, ApiError>;

    async fn send_chat_message(&self, text: &str) -> Result<ChatMessage, ApiError>;

    async fn edit_item(
        &self,
        kind: ContentKind,
        id: i64,
        content: &str,
    ) -> Result<ContentItem, ApiError>;

    async fn delete_item(&self, kind: ContentKind, id: i64) -> Result<(), ApiError>;

    /// Most recent items of `kind`, oldest first. Replies are only listed
    /// through their parent post.
    async fn list_recent(
        &self,
        kind: ContentKind,
        limit: Option<u32>,
    ) -> Result<Vec<ContentItem>, ApiError>;

    async fn realtime_config(&self) -> Result<RealtimeInfo, ApiError>;
}

/// [`ContentApi`] over HTTP+JSON, authenticating every call with the
/// member's credential as HTTP Basic.
#[derive(Clone)]
pub struct HttpContentApi {
    client: reqwest::Client,
    base_url: String,
    credential: Credential,
}

impl HttpContentApi {
    pub fn new(
        base_url: impl Into<String>,
        credential: Credential,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, credential))
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .basic_auth(&self.credential.phone, Some(&self.credential.access_code))
    }

    async fn fetch_recent<T: DeserializeOwned>(
        &self,
        path: &str,
        limit: Option<u32>,
    ) -> Result<Vec<T>, ApiError> {
        let mut builder = self.request(reqwest::Method::GET, path);
        if let Some(limit) = limit {
            builder = builder.query(&[("limit", limit)]);
        }
        decode(builder.send().await?).await
    }
}

#[async_trait]
impl ContentApi for HttpContentApi {
    async fn create_post(&self, draft: &Draft) -> Result<Post, ApiError> {
        let response = self
            .request(reqwest::Method::POST, "/posts")
            .json(draft)
            .send()
            .await?;
        decode(response).await
    }

    async fn create_reply(&self, post_id: i64, draft: &Draft) -> Result<Reply, ApiError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/posts/{}/replies", post_id))
            .json(draft)
            .send()
            .await?;
        decode(response).await
    }

    async fn send_chat_message(&self, text: &str) -> Result<ChatMessage, ApiError> {
        let response = self
            .request(reqwest::Method::POST, "/chat")
            .json(&Draft::text(text))
            .send()
            .await?;
        decode(response).await
    }

    async fn edit_item(
        &self,
        kind: ContentKind,
        id: i64,
        content: &str,
    ) -> Result<ContentItem, ApiError> {
        let response = self
            .request(reqwest::Method::PATCH, &format!("/content/{}/{}", kind, id))
            .json(&json!({ "content": content }))
            .send()
            .await?;
        decode(response).await
    }

    async fn delete_item(&self, kind: ContentKind, id: i64) -> Result<(), ApiError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/content/{}/{}", kind, id))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(error_from(status, response).await)
    }

    async fn list_recent(
        &self,
        kind: ContentKind,
        limit: Option<u32>,
    ) -> Result<Vec<ContentItem>, ApiError> {
        match kind {
            ContentKind::Post => Ok(self
                .fetch_recent::<Post>("/posts/recent", limit)
                .await?
                .into_iter()
                .map(ContentItem::from)
                .collect()),
            ContentKind::Chat => Ok(self
                .fetch_recent::<ChatMessage>("/chat/recent", limit)
                .await?
                .into_iter()
                .map(ContentItem::from)
                .collect()),
            ContentKind::Reply => Err(ApiError::Validation(
                "replies are listed with their post".to_string(),
            )),
        }
    }

    async fn realtime_config(&self) -> Result<RealtimeInfo, ApiError> {
        let response = self.request(reqwest::Method::GET, "/realtime").send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    Err(error_from(status, response).await)
}

async fn error_from(status: StatusCode, response: Response) -> ApiError {
    let body = response.text().await.unwrap_or_default();
    let error = classify(status, &body);
    debug!(status = status.as_u16(), error = %error, "content api request failed");
    error
}

fn classify(status: StatusCode, body: &str) -> ApiError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let reason = parsed.as_ref().and_then(|b| b.reason);
    let message = parsed
        .map(|b| b.error)
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::PAYLOAD_TOO_LARGE => {
            ApiError::Validation(message)
        }
        StatusCode::UNAUTHORIZED => ApiError::Unauthenticated,
        StatusCode::FORBIDDEN => match reason {
            Some(reason) => ApiError::Denied(reason),
            None => ApiError::Unexpected {
                status: status.as_u16(),
                message,
            },
        },
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        StatusCode::SERVICE_UNAVAILABLE => ApiError::Unavailable(message),
        _ => ApiError::Unexpected {
            status: status.as_u16(),
            message,
        },
    }
}
