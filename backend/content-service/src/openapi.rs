/// OpenAPI documentation for the Hearth content service
use crate::handlers;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hearth Content Service API",
        version = "1.0.0",
        description = "Household posts, replies and chat. Members sign in with their phone number and the household access code; authors may edit an item once within 15 minutes and delete it within 10, administrators may always edit or delete. New content reaches other viewers over WebSocket or by polling the recent lists.",
    ),
    servers(
        (url = "http://localhost:8081", description = "Development server"),
    ),
    paths(
        handlers::posts::create_post,
        handlers::posts::recent_posts,
        handlers::posts::list_replies,
        handlers::posts::create_reply,
        handlers::chat::send_chat_message,
        handlers::chat::recent_chat,
        handlers::content::edit_item,
        handlers::content::delete_item,
        handlers::media::upload_media,
        handlers::realtime::realtime_info,
        handlers::realtime::subscribe,
    ),
    components(schemas(
        content_model::Post,
        content_model::Reply,
        content_model::ChatMessage,
        content_model::ContentItem,
        content_model::ContentKind,
        content_model::ContentEvent,
        content_model::Draft,
        content_model::MediaRef,
        content_model::MediaKind,
        content_model::DenyReason,
        content_model::RealtimeInfo,
        content_model::DistributionMode,
        handlers::content::EditRequest,
        handlers::ErrorResponse,
    )),
    tags(
        (name = "health", description = "Service health checks"),
        (name = "posts", description = "Household feed posts and their replies"),
        (name = "chat", description = "Household chat"),
        (name = "content", description = "Edit and delete for any content kind"),
        (name = "media", description = "Photo and video attachments"),
        (name = "realtime", description = "Push subscriptions and poll settings"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Basic)
                        .description(Some("Member phone number and household access code"))
                        .build(),
                ),
            )
        }
    }
}

impl ApiDoc {
    pub fn openapi_json_path() -> &'static str {
        "/api/v1/openapi.json"
    }
}
