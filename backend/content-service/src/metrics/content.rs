use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};

lazy_static! {
    /// Content mutations by kind, operation (create/edit/delete) and outcome.
    pub static ref CONTENT_MUTATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "content_mutations_total",
        "Content mutations segmented by kind, operation and outcome",
        &["kind", "operation", "outcome"]
    )
    .expect("failed to register content_mutations_total");

    /// Media uploads by media kind and result.
    pub static ref MEDIA_UPLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "media_uploads_total",
        "Media uploads segmented by media kind and result",
        &["kind", "result"]
    )
    .expect("failed to register media_uploads_total");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "content_http_request_duration_seconds",
        "HTTP request duration segmented by method and status class",
        &["method", "status"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("failed to register content_http_request_duration_seconds");
}

pub fn record_mutation(kind: &str, operation: &str, outcome: &str) {
    CONTENT_MUTATIONS_TOTAL
        .with_label_values(&[kind, operation, outcome])
        .inc();
}
