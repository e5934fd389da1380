//! Prometheus metrics for the content service.
//!
//! Collectors are grouped by concern and registered in the default
//! registry; `/metrics` renders them in text format.

use actix_web::HttpResponse;
use prometheus::{Encoder, TextEncoder};

pub mod content;
pub mod realtime;

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
