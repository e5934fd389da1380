/// Post handlers - feed, post creation and replies
use crate::error::Result;
use crate::handlers::{ErrorResponse, RecentQuery};
use crate::middleware::MemberCredential;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use content_model::{ContentItem, ContentKind, Draft, Post, Reply};

/// Create a post
#[utoipa::path(
    post,
    path = "/api/v1/posts",
    tag = "posts",
    request_body = Draft,
    responses(
        (status = 201, description = "Post created", body = Post),
        (status = 400, description = "Empty, oversized or malformed draft", body = ErrorResponse),
        (status = 401, description = "Credential not recognised", body = ErrorResponse)
    ),
    security(("basic_auth" = []))
)]
pub async fn create_post(
    state: web::Data<AppState>,
    credential: MemberCredential,
    draft: web::Json<Draft>,
) -> Result<HttpResponse> {
    let post = state.service.create_post(&credential.0, &draft).await?;
    Ok(HttpResponse::Created().json(post))
}

/// Most recent posts with their replies, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/posts/recent",
    tag = "posts",
    params(RecentQuery),
    responses(
        (status = 200, description = "Recent posts", body = [Post]),
        (status = 401, description = "Credential not recognised", body = ErrorResponse)
    ),
    security(("basic_auth" = []))
)]
pub async fn recent_posts(
    state: web::Data<AppState>,
    credential: MemberCredential,
    query: web::Query<RecentQuery>,
) -> Result<HttpResponse> {
    let posts: Vec<Post> = state
        .service
        .list_recent(&credential.0, ContentKind::Post, query.limit)
        .await?
        .into_iter()
        .filter_map(|item| match item {
            ContentItem::Post(post) => Some(post),
            _ => None,
        })
        .collect();
    Ok(HttpResponse::Ok().json(posts))
}

/// Replies of a post, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}/replies",
    tag = "posts",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Replies; empty once the post is deleted", body = [Reply]),
        (status = 401, description = "Credential not recognised", body = ErrorResponse)
    ),
    security(("basic_auth" = []))
)]
pub async fn list_replies(
    state: web::Data<AppState>,
    credential: MemberCredential,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let replies = state
        .service
        .list_replies(&credential.0, post_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(replies))
}

/// Reply to a post
#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/replies",
    tag = "posts",
    params(("id" = i64, Path, description = "Post id")),
    request_body = Draft,
    responses(
        (status = 201, description = "Reply created", body = Reply),
        (status = 400, description = "Empty or oversized reply", body = ErrorResponse),
        (status = 404, description = "Post no longer exists", body = ErrorResponse)
    ),
    security(("basic_auth" = []))
)]
pub async fn create_reply(
    state: web::Data<AppState>,
    credential: MemberCredential,
    post_id: web::Path<i64>,
    draft: web::Json<Draft>,
) -> Result<HttpResponse> {
    let reply = state
        .service
        .create_reply(&credential.0, post_id.into_inner(), &draft)
        .await?;
    Ok(HttpResponse::Created().json(reply))
}
