//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and written by the background poll loop.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};
use std::time::Instant;

use crate::classifier::SensorClassifier;
use crate::config::Config;
use crate::error::ExporterError;
use crate::health_stats::HealthStats;
use crate::registry::SensorRegistry;
use crate::telemetry::ExporterMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Where the poll loop currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollPhase {
    #[default]
    Idle,
    Fetching,
    Classifying,
    Updating,
}

/// Outcome of recent poll cycles.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollStatus {
    pub phase: PollPhase,
    pub cycles: u64,
    pub failures: u64,
    pub consecutive_failures: u64,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_duration_seconds: f64,
    pub last_error: Option<String>,
    pub last_reading_count: usize,
}

impl PollStatus {
    /// True once a poll has succeeded and the latest one did not fail.
    pub fn is_healthy(&self) -> bool {
        self.last_success.is_some() && self.consecutive_failures == 0
    }
}

/// Global application state shared across requests and the poll task.
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SensorRegistry>,
    pub classifier: Arc<SensorClassifier>,
    pub telemetry: ExporterMetrics,
    pub health_stats: Arc<HealthStats>,
    pub poll_status: StdRwLock<PollStatus>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, ExporterError> {
        let classifier = SensorClassifier::with_constant_labels(&config.constant_labels);

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(SensorRegistry::new()),
            classifier: Arc::new(classifier),
            telemetry: ExporterMetrics::new()?,
            health_stats: Arc::new(HealthStats::new()),
            poll_status: StdRwLock::new(PollStatus::default()),
            start_time: Instant::now(),
        })
    }

    pub fn shared(config: Config) -> Result<SharedState, ExporterError> {
        Ok(Arc::new(Self::new(config)?))
    }

    /// Copy of the current poll status.
    pub fn poll_status(&self) -> PollStatus {
        self.poll_status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_poll_status(&self, f: impl FnOnce(&mut PollStatus)) {
        let mut status = self
            .poll_status
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut status);
    }
}
