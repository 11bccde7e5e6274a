//! Prometheus metrics describing the exporter itself.
//!
//! These live in their own `prometheus::Registry` and are appended to the
//! sensor series on `/metrics` when telemetry is enabled.

use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 8 * 1024;

/// Exporter self-metrics.
#[derive(Clone)]
pub struct ExporterMetrics {
    registry: Registry,

    // ========== Poll Loop ==========
    pub polls_total: IntCounter,
    pub poll_failures_total: IntCounter,
    pub poll_success: Gauge,
    pub poll_duration_seconds: Gauge,
    pub last_success_timestamp_seconds: Gauge,
    pub readings: Gauge,

    // ========== Registry ==========
    pub series: Gauge,
    pub unknown_sensor_types: Gauge,

    // ========== HTTP ==========
    pub scrape_duration_seconds: Gauge,
}

impl ExporterMetrics {
    /// Creates and registers all exporter metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let polls_total = IntCounter::new(
            "ohm_exporter_polls_total",
            "Total number of sensor poll cycles attempted",
        )?;
        let poll_failures_total = IntCounter::new(
            "ohm_exporter_poll_failures_total",
            "Total number of poll cycles where the hardware monitor was unavailable",
        )?;
        let poll_success = Gauge::new(
            "ohm_exporter_poll_success",
            "Whether the last poll cycle succeeded (1) or failed (0)",
        )?;
        let poll_duration_seconds = Gauge::new(
            "ohm_exporter_poll_duration_seconds",
            "Duration of the last poll cycle in seconds",
        )?;
        let last_success_timestamp_seconds = Gauge::new(
            "ohm_exporter_last_success_timestamp_seconds",
            "Unix time of the last successful poll cycle",
        )?;
        let readings = Gauge::new(
            "ohm_exporter_readings",
            "Number of sensor readings returned by the last successful poll",
        )?;
        let series = Gauge::new(
            "ohm_exporter_series",
            "Number of sensor series currently exported",
        )?;
        let unknown_sensor_types = Gauge::new(
            "ohm_exporter_unknown_sensor_types",
            "Number of distinct sensor types without a classification rule",
        )?;
        let scrape_duration_seconds = Gauge::new(
            "ohm_exporter_scrape_duration_seconds",
            "Time spent rendering the last /metrics response",
        )?;

        registry.register(Box::new(polls_total.clone()))?;
        registry.register(Box::new(poll_failures_total.clone()))?;
        registry.register(Box::new(poll_success.clone()))?;
        registry.register(Box::new(poll_duration_seconds.clone()))?;
        registry.register(Box::new(last_success_timestamp_seconds.clone()))?;
        registry.register(Box::new(readings.clone()))?;
        registry.register(Box::new(series.clone()))?;
        registry.register(Box::new(unknown_sensor_types.clone()))?;
        registry.register(Box::new(scrape_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            polls_total,
            poll_failures_total,
            poll_success,
            poll_duration_seconds,
            last_success_timestamp_seconds,
            readings,
            series,
            unknown_sensor_types,
            scrape_duration_seconds,
        })
    }

    /// Records the outcome of one poll cycle.
    pub fn record_poll(&self, success: bool, duration_seconds: f64) {
        self.polls_total.inc();
        self.poll_duration_seconds.set(duration_seconds);
        if success {
            self.poll_success.set(1.0);
        } else {
            self.poll_failures_total.inc();
            self.poll_success.set(0.0);
        }
    }

    /// Encodes all exporter metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let families = self.registry.gather();
        let mut buffer = Vec::with_capacity(BUFFER_CAP);
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
