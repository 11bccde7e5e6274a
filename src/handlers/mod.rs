//! HTTP endpoint handlers for the exporter.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/metrics` (configurable): Prometheus text exposition of sensor series
//! - `/health`: Poll loop status and exporter statistics
//! - `/config`: Effective configuration as YAML
//! - `/`: HTML landing page

pub mod config;
pub mod health;
pub mod metrics;
pub mod root;

use axum::{routing::get, Router};

use crate::state::SharedState;

// Re-export handlers
pub use config::config_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use root::root_handler;

/// Builds the exporter's router.
pub fn build_router(state: SharedState) -> Router {
    let mut app = Router::new()
        .route("/", get(root_handler))
        .route(state.config.metrics_path(), get(metrics_handler))
        .route("/config", get(config_handler));

    if state.config.health_enabled() {
        app = app.route("/health", get(health_handler));
    }

    app.with_state(state)
}
