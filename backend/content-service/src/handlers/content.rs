/// Edit and delete, shared by every content kind
use crate::error::{AppError, Result};
use crate::handlers::ErrorResponse;
use crate::middleware::MemberCredential;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use content_model::{ContentItem, ContentKind};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct EditRequest {
    pub content: String,
}

fn parse_kind(raw: &str) -> Result<ContentKind> {
    raw.parse::<ContentKind>().map_err(AppError::BadRequest)
}

/// Replace an item's text
#[utoipa::path(
    patch,
    path = "/api/v1/content/{kind}/{id}",
    tag = "content",
    params(
        ("kind" = String, Path, description = "post, reply or chat"),
        ("id" = i64, Path, description = "Item id")
    ),
    request_body = EditRequest,
    responses(
        (status = 200, description = "Updated item", body = ContentItem),
        (status = 400, description = "Invalid content or kind", body = ErrorResponse),
        (status = 403, description = "Denied; `reason` carries the token", body = ErrorResponse),
        (status = 404, description = "Item no longer exists", body = ErrorResponse),
        (status = 409, description = "Item changed concurrently", body = ErrorResponse)
    ),
    security(("basic_auth" = []))
)]
pub async fn edit_item(
    state: web::Data<AppState>,
    credential: MemberCredential,
    path: web::Path<(String, i64)>,
    body: web::Json<EditRequest>,
) -> Result<HttpResponse> {
    let (kind, id) = path.into_inner();
    let kind = parse_kind(&kind)?;
    let item = state
        .service
        .edit_item(&credential.0, kind, id, &body.content)
        .await?;
    Ok(HttpResponse::Ok().json(item))
}

/// Delete an item; deleting a post removes its replies
#[utoipa::path(
    delete,
    path = "/api/v1/content/{kind}/{id}",
    tag = "content",
    params(
        ("kind" = String, Path, description = "post, reply or chat"),
        ("id" = i64, Path, description = "Item id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Denied; `reason` carries the token", body = ErrorResponse),
        (status = 404, description = "Item no longer exists", body = ErrorResponse)
    ),
    security(("basic_auth" = []))
)]
pub async fn delete_item(
    state: web::Data<AppState>,
    credential: MemberCredential,
    path: web::Path<(String, i64)>,
) -> Result<HttpResponse> {
    let (kind, id) = path.into_inner();
    let kind = parse_kind(&kind)?;
    state.service.delete_item(&credential.0, kind, id).await?;
    Ok(HttpResponse::NoContent().finish())
}
