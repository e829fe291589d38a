//! Prometheus metrics for the pairing exchange.
//!
//! All metrics follow the naming convention: `px_<component>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Envelopes handed to the relay, by message type
    pub static ref ENVELOPES_SENT: CounterVec = CounterVec::new(
        Opts::new("px_relay_envelopes_sent_total", "Envelopes handed to the relay"),
        &["message_type"]
    ).expect("metric creation failed");

    /// Envelopes decoded from the inbox, by message type
    pub static ref ENVELOPES_RECEIVED: CounterVec = CounterVec::new(
        Opts::new("px_inbox_envelopes_received_total", "Envelopes decoded from the inbox"),
        &["message_type"]
    ).expect("metric creation failed");

    /// Acknowledgments sent to the relay
    pub static ref ACKS_SENT: Counter = Counter::new(
        "px_inbox_acks_sent_total",
        "Inbox entries acknowledged"
    ).expect("metric creation failed");

    /// Completed handshakes by outcome
    pub static ref HANDSHAKES: CounterVec = CounterVec::new(
        Opts::new("px_pairing_handshakes_total", "Pairing handshakes by outcome"),
        &["outcome"]  // success/rejected/timeout/failed
    ).expect("metric creation failed");

    /// Envelopes whose signature or addressing did not verify
    pub static ref VERIFICATION_FAILURES: Counter = Counter::new(
        "px_envelope_verification_failures_total",
        "Envelopes discarded because verification failed"
    ).expect("metric creation failed");

    /// Payment/call requests waiting for the host to answer
    pub static ref PENDING_REQUESTS: Gauge = Gauge::new(
        "px_dispatch_pending_requests",
        "Requests presented to the host and not yet answered"
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; collectors that are already registered are skipped.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ENVELOPES_SENT.clone()),
        Box::new(ENVELOPES_RECEIVED.clone()),
        Box::new(ACKS_SENT.clone()),
        Box::new(HANDSHAKES.clone()),
        Box::new(VERIFICATION_FAILURES.clone()),
        Box::new(PENDING_REQUESTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
