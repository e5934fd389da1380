use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, register_int_gauge_vec, IntCounterVec, IntGaugeVec};

lazy_static! {
    /// Events handed to the distributor, by kind, event type and path
    /// (local, relay, poll).
    pub static ref REALTIME_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "realtime_events_total",
        "Realtime events segmented by kind, event and delivery path",
        &["kind", "event", "path"]
    )
    .expect("failed to register realtime_events_total");

    /// Open WebSocket subscriptions per content kind.
    pub static ref REALTIME_SUBSCRIBERS: IntGaugeVec = register_int_gauge_vec!(
        "realtime_subscribers",
        "Open realtime subscriptions segmented by kind",
        &["kind"]
    )
    .expect("failed to register realtime_subscribers");
}
