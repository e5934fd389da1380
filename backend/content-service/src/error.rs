/// Error types for the content service
///
/// Every failure a caller can see is one of these. Store, identity and
/// upload failures are translated here before they reach a handler, and
/// each variant maps to one HTTP status.
use crate::db::StoreError;
use crate::services::identity::IdentityError;
use crate::services::media::UploadError;
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use content_model::{ContentKind, DenyReason, ValidationError};
use thiserror::Error;

/// Result type for content-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Draft or edit rejected before any store access
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("authentication required")]
    Unauthenticated,

    /// Authorizer verdict; the token is shown to the user verbatim
    #[error("{0}")]
    Denied(DenyReason),

    #[error("{0} not found")]
    NotFound(String),

    /// The item changed between the authorization read and the write
    #[error("item was modified concurrently")]
    Conflict,

    #[error("push distribution is disabled; poll /recent instead")]
    PushDisabled,

    #[error("unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("content store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(kind: ContentKind, id: i64) -> Self {
        AppError::NotFound(format!("{} {}", kind, id))
    }

    /// Label used for the outcome dimension of mutation metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            AppError::Validation(_)
            | AppError::BadRequest(_)
            | AppError::UnsupportedMedia(_)
            | AppError::PayloadTooLarge { .. } => "invalid",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Denied(_) => "denied",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict | AppError::PushDisabled => "conflict",
            AppError::StoreUnavailable(_) | AppError::DependencyUnavailable(_) => "unavailable",
            AppError::Internal(_) => "error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Denied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict | AppError::PushDisabled => StatusCode::CONFLICT,
            AppError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::StoreUnavailable(_) | AppError::DependencyUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });
        if let AppError::Denied(reason) = self {
            body["reason"] = serde_json::Value::from(reason.as_str());
        }

        HttpResponse::build(status).json(body)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => AppError::StoreUnavailable(msg),
            StoreError::ParentMissing(post_id) => AppError::not_found(ContentKind::Post, post_id),
            StoreError::Backend(msg) => AppError::Internal(msg),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Unauthenticated => AppError::Unauthenticated,
            IdentityError::Unavailable(msg) => AppError::DependencyUnavailable(msg),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::UnsupportedType(mime) => AppError::UnsupportedMedia(mime),
            UploadError::Disabled => {
                AppError::DependencyUnavailable("media uploads are not configured".to_string())
            }
            UploadError::Backend(msg) => AppError::DependencyUnavailable(msg),
        }
    }
}
