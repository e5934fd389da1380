use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::{anyhow, Context};
use chrono::Utc;
use content_model::{Identity, RealtimeInfo};
use db_pool::{create_pool, DbConfig, PoolStats};
use hearth_content::clock::SystemClock;
use hearth_content::config::{Config, StoreBackend};
use hearth_content::db::{ContentStore, MemoryContentStore, PgContentStore, MIGRATOR};
use hearth_content::openapi::ApiDoc;
use hearth_content::realtime::{
    ConnectionRegistry, Distributor, EventRelay, PollDistributor, PushDistributor, RedisRelay,
};
use hearth_content::services::{
    AccessCode, BlobUploader, ContentService, DisabledBlobUploader, IdentityResolver, ListLimits,
    PgIdentityResolver, S3BlobUploader, StaticIdentityResolver,
};
use hearth_content::state::AppState;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinHandle, JoinSet};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

struct HealthState {
    store: Arc<dyn ContentStore>,
    relay: Option<RedisRelay>,
    db_pool: Option<PgPool>,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "lowercase")]
enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Serialize)]
struct ComponentCheck {
    status: ComponentStatus,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    status: ComponentStatus,
    checks: HashMap<String, ComponentCheck>,
    timestamp: String,
}

impl HealthState {
    fn pool_check(&self) -> Option<ComponentCheck> {
        let stats = PoolStats::of(self.db_pool.as_ref()?);
        let status = if stats.utilization() >= 0.9 {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        };
        Some(ComponentCheck {
            status,
            message: format!(
                "{} active, {} idle, {} max",
                stats.active(),
                stats.idle,
                stats.max
            ),
            latency_ms: None,
        })
    }
}

async fn health_summary(state: web::Data<HealthState>) -> HttpResponse {
    match state.store.ping().await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "hearth-content",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("content store unreachable: {}", e),
            "service": "hearth-content"
        })),
    }
}

async fn readiness_summary(state: web::Data<HealthState>) -> HttpResponse {
    let mut checks = HashMap::new();
    let mut ready = true;

    let start = Instant::now();
    let store_result = state.store.ping().await;
    let store_latency = Some(start.elapsed().as_millis() as u64);
    let store_check = match store_result {
        Ok(_) => ComponentCheck {
            status: ComponentStatus::Healthy,
            message: "content store reachable".to_string(),
            latency_ms: store_latency,
        },
        Err(e) => {
            ready = false;
            ComponentCheck {
                status: ComponentStatus::Unhealthy,
                message: format!("content store unreachable: {}", e),
                latency_ms: store_latency,
            }
        }
    };
    checks.insert("store".to_string(), store_check);

    if let Some(pool_check) = state.pool_check() {
        checks.insert("db_pool".to_string(), pool_check);
    }

    // A dead relay only costs cross-instance delivery; local push still works.
    if let Some(relay) = &state.relay {
        let start = Instant::now();
        let redis_result = relay.ping().await;
        let redis_latency = Some(start.elapsed().as_millis() as u64);
        let redis_check = match redis_result {
            Ok(_) if !relay.is_listening() => ComponentCheck {
                status: ComponentStatus::Degraded,
                message: "Redis reachable, relay subscription down".to_string(),
                latency_ms: redis_latency,
            },
            Ok(_) => ComponentCheck {
                status: ComponentStatus::Healthy,
                message: "Redis ping successful".to_string(),
                latency_ms: redis_latency,
            },
            Err(e) => ComponentCheck {
                status: ComponentStatus::Degraded,
                message: format!("Redis ping failed: {}", e),
                latency_ms: redis_latency,
            },
        };
        checks.insert("redis".to_string(), redis_check);
    }

    let status = if ready {
        ComponentStatus::Healthy
    } else {
        ComponentStatus::Unhealthy
    };

    let response = ReadinessResponse {
        ready,
        status,
        checks,
        timestamp: Utc::now().to_rfc3339(),
    };

    if ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

async fn liveness_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"alive": true}))
}

async fn openapi_json(doc: web::Data<utoipa::openapi::OpenApi>) -> actix_web::Result<HttpResponse> {
    let body = serde_json::to_string(&*doc).map_err(|e| {
        tracing::error!("OpenAPI serialization failed: {}", e);
        actix_web::error::ErrorInternalServerError("OpenAPI serialization error")
    })?;

    Ok(HttpResponse::Ok()
        .content_type("application/json")
        .body(body))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    }
}

fn init_tracing() {
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

/// Everything the HTTP workers share, plus the background relay listener.
struct Components {
    app_state: AppState,
    health: HealthState,
    relay_listener: Option<JoinHandle<()>>,
}

async fn build_components(config: &Config) -> anyhow::Result<Components> {
    let access_code = AccessCode::from_sha256_hex(&config.household.access_code_sha256)
        .map_err(|e| anyhow!(e))
        .context("invalid HOUSEHOLD_ACCESS_CODE_SHA256")?;

    let (store, identity, db_pool): (
        Arc<dyn ContentStore>,
        Arc<dyn IdentityResolver>,
        Option<PgPool>,
    ) = match config.app.store {
        StoreBackend::Postgres => {
            let db_cfg = DbConfig::from_env(
                "hearth-content",
                &config.database.url,
                config.database.max_connections,
            );
            db_cfg.log_config();
            let pool = create_pool(db_cfg)
                .await
                .context("failed to create database pool")?;

            MIGRATOR
                .run(&pool)
                .await
                .context("failed to run database migrations")?;
            tracing::info!("Database migrations applied");

            (
                Arc::new(PgContentStore::new(pool.clone())),
                Arc::new(PgIdentityResolver::new(pool.clone(), access_code)),
                Some(pool),
            )
        }
        StoreBackend::Memory => {
            let resolver = config.household.members.iter().fold(
                StaticIdentityResolver::new(access_code),
                |resolver, seed| {
                    let identity = if seed.is_admin {
                        Identity::admin(&seed.display_name)
                    } else {
                        Identity::member(&seed.display_name, "Member")
                    };
                    resolver.with_member(&seed.phone, identity)
                },
            );
            if resolver.is_empty() {
                tracing::warn!("Memory store has no HOUSEHOLD_MEMBERS; every sign-in will fail");
            }
            tracing::warn!("Using in-memory content store; content is lost on restart");

            (
                Arc::new(MemoryContentStore::new()),
                Arc::new(resolver),
                None,
            )
        }
    };

    let registry = ConnectionRegistry::new();
    let mut relay_listener = None;
    let mut health_relay = None;

    let distributor: Arc<dyn Distributor> = match config.realtime.mode {
        content_model::DistributionMode::Push => match &config.realtime.redis_url {
            Some(url) => {
                let relay = RedisRelay::connect(url, config.realtime.channel.clone())
                    .await
                    .context("failed to connect realtime relay")?;
                relay_listener = Some(
                    relay
                        .listen(registry.clone())
                        .await
                        .context("failed to subscribe to realtime relay")?,
                );
                tracing::info!(channel = relay.channel(), "Realtime push via Redis relay");
                health_relay = Some(relay.clone());
                Arc::new(PushDistributor::with_relay(registry.clone(), Arc::new(relay)))
            }
            None => {
                tracing::info!("Realtime push to local subscribers");
                Arc::new(PushDistributor::new(registry.clone()))
            }
        },
        content_model::DistributionMode::Poll => {
            tracing::info!(
                interval_ms = config.realtime.poll_interval_ms,
                "Realtime push disabled; clients poll"
            );
            Arc::new(PollDistributor)
        }
    };

    let uploader: Arc<dyn BlobUploader> = match &config.media.bucket {
        Some(bucket) => {
            tracing::info!(bucket = %bucket, "Media uploads to S3");
            Arc::new(
                S3BlobUploader::from_env(bucket.clone(), config.media.public_base_url.clone())
                    .await,
            )
        }
        None => {
            tracing::warn!("MEDIA_BUCKET not set; media uploads are disabled");
            Arc::new(DisabledBlobUploader)
        }
    };

    let service = ContentService::new(
        store.clone(),
        identity,
        distributor.clone(),
        Arc::new(SystemClock),
    )
    .with_list_limits(ListLimits {
        default: config.content.list_default,
        max: config.content.list_max,
    });

    Ok(Components {
        app_state: AppState {
            service: Arc::new(service),
            registry,
            realtime: RealtimeInfo {
                mode: distributor.mode(),
                poll_interval_ms: config.realtime.poll_interval_ms,
            },
            uploader,
            media_max_bytes: config.media.max_bytes,
        },
        health: HealthState {
            store,
            relay: health_relay,
            db_pool,
        },
        relay_listener,
    })
}

/// Hearth Content Service
///
/// Household posts with replies, a shared chat, and realtime delivery of
/// every change to connected viewers.
///
/// # Routes
///
/// - `/api/v1/posts/*` - create posts, recent feed, replies
/// - `/api/v1/chat/*` - send and list chat messages
/// - `/api/v1/content/{kind}/{id}` - edit or delete any item
/// - `/api/v1/media` - attachment upload
/// - `/api/v1/realtime/*` - distribution mode and WebSocket subscriptions
/// - `/api/v1/health/*`, `/metrics`, `/swagger-ui/`
#[actix_web::main]
async fn main() -> io::Result<()> {
    // Support container healthchecks via CLI subcommand
    {
        let mut args = std::env::args();
        let _bin = args.next();
        if let Some(cmd) = args.next() {
            if cmd == "healthcheck" || cmd == "healthcheck-http" {
                let port = std::env::var("CONTENT_SERVICE_PORT").unwrap_or_else(|_| "8081".into());
                let url = format!("http://127.0.0.1:{}/api/v1/health", port);
                match reqwest::Client::new().get(&url).send().await {
                    Ok(resp) if resp.status().is_success() => return Ok(()),
                    Ok(resp) => {
                        eprintln!("healthcheck HTTP status: {}", resp.status());
                        return Err(io::Error::new(io::ErrorKind::Other, "healthcheck failed"));
                    }
                    Err(e) => {
                        eprintln!("healthcheck HTTP error: {}", e);
                        return Err(io::Error::new(io::ErrorKind::Other, "healthcheck error"));
                    }
                }
            }
        }
    }

    dotenvy::dotenv().ok();
    init_tracing();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting hearth-content v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    let components = match build_components(&config).await {
        Ok(components) => components,
        Err(e) => {
            tracing::error!("Startup failed: {:#}", e);
            eprintln!("ERROR: {:#}", e);
            std::process::exit(1);
        }
    };

    let app_state = web::Data::new(components.app_state);
    let health_state = web::Data::new(components.health);
    let media_max_bytes = config.media.max_bytes;
    let allowed_origins = config.cors.allowed_origins.clone();

    let http_bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at {}", http_bind_address);

    let server = HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in allowed_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else if !origin.is_empty() {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        let openapi_doc = ApiDoc::openapi();

        App::new()
            .app_data(web::Data::new(openapi_doc.clone()))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url(ApiDoc::openapi_json_path(), openapi_doc.clone()),
            )
            .route(ApiDoc::openapi_json_path(), web::get().to(openapi_json))
            .app_data(app_state.clone())
            .app_data(health_state.clone())
            .wrap(cors)
            .wrap(tracing_actix_web::TracingLogger::default())
            .route(
                "/metrics",
                web::get().to(hearth_content::metrics::serve_metrics),
            )
            .route("/api/v1/health", web::get().to(health_summary))
            .route("/api/v1/health/ready", web::get().to(readiness_summary))
            .route("/api/v1/health/live", web::get().to(liveness_check))
            .configure(|cfg| hearth_content::routes::configure(cfg, media_max_bytes))
    })
    .bind(&http_bind_address)?
    .workers(4)
    .run();

    let server_handle = server.handle();

    let mut tasks: JoinSet<io::Result<()>> = JoinSet::new();

    tasks.spawn(async move {
        tracing::info!("HTTP server is running");
        server.await
    });

    if let Some(listener) = components.relay_listener {
        tasks.spawn(async move {
            listener
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            tracing::warn!("Realtime relay listener exited; events from this instance are broadcast locally");
            Ok(())
        });
    }

    let mut first_error: Option<io::Error> = None;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = tasks.join_next() => {
                match result {
                    Some(Ok(Ok(_))) => {
                        tracing::info!("Background task completed");
                    }
                    Some(Ok(Err(e))) => {
                        tracing::error!("Task returned error: {}", e);
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                        server_handle.stop(true).await;
                        tasks.shutdown().await;
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::error!("Task join error: {}", e);
                        if first_error.is_none() {
                            first_error = Some(io::Error::new(io::ErrorKind::Other, e.to_string()));
                        }
                        server_handle.stop(true).await;
                        tasks.shutdown().await;
                        break;
                    }
                    None => break,
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                server_handle.stop(true).await;
                tasks.shutdown().await;
                break;
            }
        }
    }

    tracing::info!("hearth-content shutting down");

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
