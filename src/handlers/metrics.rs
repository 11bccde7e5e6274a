//! Metrics endpoint handler for Prometheus scraping.
//!
//! Serves the current registry snapshot, followed by the exporter's own
//! metrics when telemetry is enabled. The response never depends on the
//! hardware monitor being reachable.

use axum::{extract::State, http::header, response::IntoResponse};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::exposition::{self, CONTENT_TYPE};
use crate::state::SharedState;

/// Handler for the metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let start = Instant::now();
    debug!("Processing metrics request");

    let snapshot = state.registry.snapshot();
    let mut body = exposition::render(&snapshot, state.config.expose_timestamps());

    if state.config.telemetry_enabled() {
        state.telemetry.series.set(snapshot.len() as f64);
        match state.telemetry.encode() {
            Ok(text) => body.push_str(&text),
            Err(e) => error!("Failed to encode exporter metrics: {}", e),
        }
    }

    let elapsed = start.elapsed();
    state
        .telemetry
        .scrape_duration_seconds
        .set(elapsed.as_secs_f64());
    state.health_stats.record_http_request();
    state
        .health_stats
        .record_scrape(elapsed.as_secs_f64() * 1000.0, body.len());

    debug!(
        "Metrics request completed: {} series, {} bytes, {:.3}ms",
        snapshot.len(),
        body.len(),
        elapsed.as_secs_f64() * 1000.0
    );

    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}
