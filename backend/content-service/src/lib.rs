/// Hearth Content Service Library
///
/// Household posts, replies and chat with author edit/delete windows and
/// realtime distribution to connected viewers.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers
/// - `services`: content rules, identity resolution, media storage
/// - `db`: content store trait with Postgres and in-memory backends
/// - `realtime`: WebSocket subscriptions and event distribution
/// - `middleware`: credential extraction and request metrics
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Prometheus collectors
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod realtime;
pub mod routes;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{AppError, Result};
