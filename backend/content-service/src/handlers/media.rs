/// Media upload handler
use crate::error::{AppError, Result};
use crate::handlers::ErrorResponse;
use crate::metrics::content::MEDIA_UPLOADS_TOTAL;
use crate::middleware::MemberCredential;
use crate::state::AppState;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::{web, HttpRequest, HttpResponse};
use content_model::{MediaKind, MediaRef};

/// Upload a photo or video; the returned reference goes into a post draft
#[utoipa::path(
    post,
    path = "/api/v1/media",
    tag = "media",
    request_body(content = Vec<u8>, content_type = "image/*", description = "Raw image or video bytes"),
    responses(
        (status = 201, description = "Stored", body = MediaRef),
        (status = 413, description = "Larger than the configured limit", body = ErrorResponse),
        (status = 415, description = "Not an image or video", body = ErrorResponse),
        (status = 503, description = "Object storage unavailable or not configured", body = ErrorResponse)
    ),
    security(("basic_auth" = []))
)]
pub async fn upload_media(
    state: web::Data<AppState>,
    credential: MemberCredential,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let identity = state.service.resolve(&credential.0).await?;

    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let kind = MediaKind::from_mime(&content_type)
        .ok_or_else(|| AppError::UnsupportedMedia(content_type.clone()))?;

    if body.is_empty() {
        return Err(AppError::BadRequest("empty upload".to_string()));
    }
    if body.len() > state.media_max_bytes {
        return Err(AppError::PayloadTooLarge {
            limit: state.media_max_bytes,
        });
    }

    let size = body.len();
    match state
        .uploader
        .upload(body.to_vec(), kind, &content_type)
        .await
    {
        Ok(url) => {
            MEDIA_UPLOADS_TOTAL
                .with_label_values(&[kind.as_str(), "ok"])
                .inc();
            tracing::info!(member = %identity.display_name, kind = kind.as_str(), size, "media stored");
            Ok(HttpResponse::Created().json(MediaRef { url, kind }))
        }
        Err(err) => {
            MEDIA_UPLOADS_TOTAL
                .with_label_values(&[kind.as_str(), "error"])
                .inc();
            tracing::warn!(member = %identity.display_name, error = %err, "media upload failed");
            Err(err.into())
        }
    }
}
