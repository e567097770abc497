use ::metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Start the Prometheus HTTP exporter on `addr`.
/// After this call, any metrics recorded via the `metrics` crate
/// macros (counter!, histogram!) are automatically exported at /metrics.
pub fn init_metrics_server(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| anyhow::anyhow!("failed to start Prometheus metrics server: {err}"))
}

// ── Fetch client metrics ─────────────────────────────────────────

pub fn record_api_request(op: &'static str, outcome: &'static str) {
    counter!("api_requests_total", "op" => op, "outcome" => outcome).increment(1);
}

pub fn record_api_latency(op: &'static str, latency_ms: f64) {
    histogram!("api_request_latency_ms", "op" => op).record(latency_ms);
}

// ── Bootstrap metrics ────────────────────────────────────────────

pub fn record_flow(flow: &'static str, outcome: &'static str) {
    counter!("bootstrap_flows_total", "flow" => flow, "outcome" => outcome).increment(1);
}

pub fn record_prefetch(outcome: &'static str) {
    counter!("prefetch_requests_total", "outcome" => outcome).increment(1);
}

// ── Live feed metrics ────────────────────────────────────────────

pub fn record_feed_message(kind: &'static str) {
    counter!("feed_messages_total", "kind" => kind).increment(1);
}

pub fn record_feed_connection(event: &'static str) {
    counter!("feed_connections_total", "event" => event).increment(1);
}
