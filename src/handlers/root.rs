//! Root endpoint handler for the landing page.
//!
//! This module provides the `/` endpoint handler that displays
//! a landing page with the available endpoints and poll status.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");
    state.health_stats.record_http_request();

    let version = env!("CARGO_PKG_VERSION");
    let built = env!("VERGEN_BUILD_TIMESTAMP");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let poll = state.poll_status();
    let poll_str = match (poll.is_healthy(), poll.last_success) {
        (true, _) => "OK".to_string(),
        (false, None) => "waiting for hardware monitor".to_string(),
        (false, Some(_)) => format!("{} failed poll(s)", poll.consecutive_failures),
    };

    let metrics_path = state.config.metrics_path();
    let health_item = if state.config.health_enabled() {
        r#"<li>
            <a href="/health">/health</a>
            <div class="endpoint-desc">Poll status and exporter statistics (text, 503 while the monitor is unreachable)</div>
        </li>"#
    } else {
        ""
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>OHM Exporter</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 20px;
            background: #f5f5f5;
            line-height: 1.6;
        }}
        .container {{
            max-width: 900px;
            margin: 0 auto;
            background: white;
            padding: 40px;
            border-radius: 8px;
            box-shadow: 0 2px 8px rgba(0,0,0,0.1);
        }}
        h1 {{
            color: #333;
            border-bottom: 3px solid #d9534f;
            padding-bottom: 15px;
            margin-bottom: 10px;
        }}
        .subtitle {{ color: #666; font-size: 1.1em; margin-bottom: 30px; }}
        .info {{
            background: #e9ecef;
            padding: 15px;
            border-radius: 4px;
            margin: 20px 0;
            display: flex;
            justify-content: space-around;
            flex-wrap: wrap;
        }}
        .info-item {{ margin: 10px; }}
        .info-label {{ font-weight: 600; color: #555; display: block; font-size: 0.9em; }}
        .info-value {{ font-size: 1.2em; color: #d9534f; }}
        .endpoint-list {{ list-style: none; padding: 0; }}
        .endpoint-list li {{
            margin: 20px 0;
            padding: 15px;
            background: #f8f9fa;
            border-left: 4px solid #d9534f;
            border-radius: 4px;
        }}
        .endpoint-list a {{ color: #d9534f; text-decoration: none; font-weight: 600; font-size: 1.1em; }}
        .endpoint-desc {{ color: #666; margin-top: 5px; }}
        .footer {{
            margin-top: 40px;
            padding-top: 20px;
            border-top: 1px solid #ddd;
            color: #666;
            font-size: 0.9em;
            text-align: center;
        }}
        code {{ background: #e9ecef; padding: 2px 6px; border-radius: 3px; font-family: 'Courier New', monospace; }}
    </style>
</head>
<body>
<div class="container">
    <h1>OHM Exporter</h1>
    <p class="subtitle">OpenHardwareMonitor sensors for Prometheus, polled from <code>{source}</code></p>

    <div class="info">
        <div class="info-item">
            <span class="info-label">Version</span>
            <span class="info-value">{version}</span>
        </div>
        <div class="info-item">
            <span class="info-label">Built</span>
            <span class="info-value">{built}</span>
        </div>
        <div class="info-item">
            <span class="info-label">Uptime</span>
            <span class="info-value">{uptime}</span>
        </div>
        <div class="info-item">
            <span class="info-label">Series</span>
            <span class="info-value">{series}</span>
        </div>
        <div class="info-item">
            <span class="info-label">Poll</span>
            <span class="info-value">{poll}</span>
        </div>
    </div>

    <h2>Available Endpoints</h2>
    <ul class="endpoint-list">
        <li>
            <a href="{metrics_path}">{metrics_path}</a>
            <div class="endpoint-desc">Prometheus-compatible metrics endpoint</div>
        </li>
        {health_item}
        <li>
            <a href="/config">/config</a>
            <div class="endpoint-desc">Active runtime configuration (YAML, read-only)</div>
        </li>
    </ul>

    <div class="footer">
        <p>{footer}</p>
    </div>
</div>
</body>
</html>"#,
        source = state.config.source_location(),
        version = version,
        built = built,
        uptime = uptime_str,
        series = state.registry.len(),
        poll = poll_str,
        metrics_path = metrics_path,
        health_item = health_item,
        footer = FOOTER_TEXT
    );

    Html(html)
}
