/// Route table for the `/api/v1` content endpoints
///
/// Health, metrics and API docs are mounted by the binary; everything here
/// requires a member credential.
use crate::handlers;
use crate::middleware::MetricsMiddleware;
use actix_web::web;

/// Register the API scope. The media payload limit sits one byte above
/// `media_max_bytes` so the handler reports the configured cap in its 413.
pub fn configure(cfg: &mut web::ServiceConfig, media_max_bytes: usize) {
    cfg.service(
        web::scope("/api/v1")
            .wrap(MetricsMiddleware)
            .service(
                web::scope("/posts")
                    .service(web::resource("").route(web::post().to(handlers::create_post)))
                    .service(web::resource("/recent").route(web::get().to(handlers::recent_posts)))
                    .service(
                        web::resource("/{post_id}/replies")
                            .route(web::get().to(handlers::list_replies))
                            .route(web::post().to(handlers::create_reply)),
                    ),
            )
            .service(
                web::scope("/chat")
                    .service(
                        web::resource("").route(web::post().to(handlers::send_chat_message)),
                    )
                    .service(web::resource("/recent").route(web::get().to(handlers::recent_chat))),
            )
            .service(
                web::resource("/content/{kind}/{id}")
                    .route(web::patch().to(handlers::edit_item))
                    .route(web::delete().to(handlers::delete_item)),
            )
            .service(
                web::resource("/media")
                    .app_data(web::PayloadConfig::new(media_max_bytes.saturating_add(1)))
                    .route(web::post().to(handlers::upload_media)),
            )
            .service(web::resource("/realtime").route(web::get().to(handlers::realtime_info)))
            .service(web::resource("/realtime/{kind}").route(web::get().to(handlers::subscribe))),
    );
}
