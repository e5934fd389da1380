/// Realtime handlers - distribution mode and WebSocket subscriptions
use crate::error::AppError;
use crate::handlers::ErrorResponse;
use crate::middleware::MemberCredential;
use crate::realtime::session::RealtimeSession;
use crate::state::AppState;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use content_model::{ContentKind, DistributionMode, RealtimeInfo};

/// How this deployment delivers new content
#[utoipa::path(
    get,
    path = "/api/v1/realtime",
    tag = "realtime",
    responses(
        (status = 200, description = "Distribution mode and poll interval", body = RealtimeInfo),
        (status = 401, description = "Credential not recognised", body = ErrorResponse)
    ),
    security(("basic_auth" = []))
)]
pub async fn realtime_info(
    state: web::Data<AppState>,
    credential: MemberCredential,
) -> Result<HttpResponse, AppError> {
    state.service.resolve(&credential.0).await?;
    Ok(HttpResponse::Ok().json(&state.realtime))
}

/// Subscribe to created/updated/deleted events of one kind
#[utoipa::path(
    get,
    path = "/api/v1/realtime/{kind}",
    tag = "realtime",
    params(("kind" = String, Path, description = "post, reply or chat")),
    responses(
        (status = 101, description = "WebSocket upgrade; text frames carry JSON events"),
        (status = 401, description = "Credential not recognised", body = ErrorResponse),
        (status = 409, description = "Push is disabled; poll the recent list instead", body = ErrorResponse)
    ),
    security(("basic_auth" = []))
)]
pub async fn subscribe(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    credential: MemberCredential,
    kind: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let kind = kind
        .parse::<ContentKind>()
        .map_err(AppError::BadRequest)?;

    if state.realtime.mode == DistributionMode::Poll {
        return Err(AppError::PushDisabled.into());
    }

    let identity = state.service.resolve(&credential.0).await?;
    let (subscriber_id, events) = state.registry.add_subscriber(kind).await;

    let session = RealtimeSession::new(
        kind,
        identity.display_name,
        subscriber_id,
        state.registry.clone(),
        events,
    );
    ws::start(session, &req, stream)
}
