//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that reports whether
//! the last poll of the hardware monitor succeeded, plus exporter statistics.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::state::{PollStatus, SharedState};

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = concat!("ohm-exporter ", env!("CARGO_PKG_VERSION"));

/// Handler for the /health endpoint.
///
/// 200 when the most recent poll succeeded, 503 before the first success
/// and while polls are failing.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");
    state.health_stats.record_http_request();

    let poll = state.poll_status();

    let (status, message) = if poll.is_healthy() {
        (StatusCode::OK, "OK".to_string())
    } else if poll.last_attempt.is_none() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Waiting for first poll".to_string(),
        )
    } else if poll.last_success.is_none() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Hardware monitor has never been reachable".to_string(),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            format!(
                "Hardware monitor unavailable ({} consecutive failures), serving last known values",
                poll.consecutive_failures
            ),
        )
    };

    let uptime_hours = state.health_stats.get_uptime_seconds() as f64 / SECONDS_PER_HOUR;
    let uptime_str = if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    };

    let poll_section = render_poll_status(
        &poll,
        &state.config.source_location(),
        state.registry.len(),
        &state.classifier.unknown_types(),
    );
    let table = state.health_stats.render_table();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\n\nUptime: {uptime_str}\n\n{poll_section}\n{table}\n{FOOTER_TEXT}\n"),
    )
}

fn render_poll_status(
    poll: &PollStatus,
    source: &str,
    series: usize,
    unknown_types: &[String],
) -> String {
    let fmt_time = |t: Option<chrono::DateTime<chrono::Utc>>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string())
    };

    let mut out = String::new();
    writeln!(out, "POLL STATUS").ok();
    writeln!(out, "===========").ok();
    writeln!(out).ok();
    writeln!(out, "{:26} {}", "source:", source).ok();
    writeln!(out, "{:26} {:?}", "phase:", poll.phase).ok();
    writeln!(out, "{:26} {}", "last_attempt:", fmt_time(poll.last_attempt)).ok();
    writeln!(out, "{:26} {}", "last_success:", fmt_time(poll.last_success)).ok();
    writeln!(out, "{:26} {:.3}s", "last_duration:", poll.last_duration_seconds).ok();
    writeln!(out, "{:26} {}", "last_readings:", poll.last_reading_count).ok();
    writeln!(out, "{:26} {}", "exported_series:", series).ok();
    writeln!(
        out,
        "{:26} {}",
        "consecutive_failures:", poll.consecutive_failures
    )
    .ok();
    if let Some(error) = &poll.last_error {
        writeln!(out, "{:26} {}", "last_error:", error).ok();
    }
    if !unknown_types.is_empty() {
        writeln!(out, "{:26} {}", "unknown_sensor_types:", unknown_types.join(", ")).ok();
    }
    out
}
