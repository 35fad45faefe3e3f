//! Prometheus metrics endpoint

use axum::{Extension, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics - HTTP metrics plus the simulator counters
/// (`sessions_started_total`, `autopilot_turns_total`, `lab_orders_total`,
/// `sessions_scored_total`, `sessions_evicted_total`) in Prometheus text format
pub async fn get(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
