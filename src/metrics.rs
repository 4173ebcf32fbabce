//! Prometheus metrics for the chat fan-out core, exposed on `/metrics`
//! (spec.md §9 observability).

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    /// Total messages persisted and published via `SendToChat`/`SendToUser`.
    pub static ref MESSAGES_SENT: IntCounter = IntCounter::new(
        "chatcore_messages_sent_total",
        "Total messages sent"
    ).unwrap();

    /// Requests rejected per `ApiError::error_code()`.
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("chatcore_errors_total", "Requests rejected, by error code"),
        &["code"],
    ).unwrap();

    /// Sessions currently attached to this node.
    pub static ref CONNECTED_SESSIONS: IntGauge = IntGauge::new(
        "chatcore_connected_sessions",
        "WebSocket sessions currently attached to this node"
    ).unwrap();

    /// Bus events consumed by this node's Bus consumer loop.
    pub static ref BUS_EVENTS_CONSUMED: IntCounter = IntCounter::new(
        "chatcore_bus_events_consumed_total",
        "Bus events consumed by this node"
    ).unwrap();

    /// PubSub envelopes this node ignored because it itself was the origin.
    pub static ref PUBSUB_SELF_ORIGIN_SKIPPED: IntCounter = IntCounter::new(
        "chatcore_pubsub_self_origin_skipped_total",
        "PubSub envelopes skipped because this node was the origin"
    ).unwrap();
}

/// Registers every metric above. Must be called once at startup before
/// anything records a value.
pub fn init() {
    REGISTRY.register(Box::new(MESSAGES_SENT.clone())).unwrap();
    REGISTRY.register(Box::new(ERRORS_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(CONNECTED_SESSIONS.clone())).unwrap();
    REGISTRY.register(Box::new(BUS_EVENTS_CONSUMED.clone())).unwrap();
    REGISTRY
        .register(Box::new(PUBSUB_SELF_ORIGIN_SKIPPED.clone()))
        .unwrap();
}

/// Encodes every registered metric in Prometheus text format, for the
/// `/metrics` handler.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
