/// Chat handlers
use crate::error::{AppError, Result};
use crate::handlers::{ErrorResponse, RecentQuery};
use crate::middleware::MemberCredential;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use content_model::{ChatMessage, ContentItem, ContentKind, Draft, ValidationError};

#[utoipa::path(
    post,
    path = "/api/v1/chat",
    tag = "chat",
    request_body = Draft,
    responses(
        (status = 201, description = "Message sent", body = ChatMessage),
        (status = 400, description = "Empty or oversized message", body = ErrorResponse),
        (status = 401, description = "Credential not recognised", body = ErrorResponse)
    ),
    security(("basic_auth" = []))
)]
pub async fn send_chat_message(
    state: web::Data<AppState>,
    credential: MemberCredential,
    draft: web::Json<Draft>,
) -> Result<HttpResponse> {
    if draft.media.is_some() {
        return Err(AppError::Validation(ValidationError::MediaNotAllowed));
    }
    let message = state
        .service
        .send_chat_message(&credential.0, &draft.content)
        .await?;
    Ok(HttpResponse::Created().json(message))
}

/// Chat history, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/chat/recent",
    tag = "chat",
    params(RecentQuery),
    responses(
        (status = 200, description = "Recent messages", body = [ChatMessage]),
        (status = 401, description = "Credential not recognised", body = ErrorResponse)
    ),
    security(("basic_auth" = []))
)]
pub async fn recent_chat(
    state: web::Data<AppState>,
    credential: MemberCredential,
    query: web::Query<RecentQuery>,
) -> Result<HttpResponse> {
    let messages: Vec<ChatMessage> = state
        .service
        .list_recent(&credential.0, ContentKind::Chat, query.limit)
        .await?
        .into_iter()
        .filter_map(|item| match item {
            ContentItem::Chat(message) => Some(message),
            _ => None,
        })
        .collect();
    Ok(HttpResponse::Ok().json(messages))
}
