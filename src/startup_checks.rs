//! Startup check of the hardware monitor.
//!
//! Fetches the sensor tree once before the poll loop starts so that an
//! unreachable monitor or an unexpected tree shape shows up in the log right
//! away. The check never prevents the exporter from starting.

use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::classifier::{SensorClassifier, SensorKind};
use crate::error::SourceError;
use crate::source::SensorSource;

/// What one fetch of the sensor tree contained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceReport {
    pub readings: usize,
    /// Top-level hardware entries, in tree order.
    pub hardware: Vec<String>,
    /// Readings per metric name.
    pub metrics: BTreeMap<String, usize>,
    /// Raw sensor types without a classification rule.
    pub unknown_types: Vec<String>,
}

/// Fetches and classifies the sensor tree once.
pub async fn check_source<S: SensorSource>(
    source: &S,
    classifier: &SensorClassifier,
) -> Result<SourceReport, SourceError> {
    let readings = source.fetch().await?;

    let mut report = SourceReport {
        readings: readings.len(),
        ..SourceReport::default()
    };

    for reading in &readings {
        if let Some(top) = reading.hardware_path.first() {
            if !report.hardware.contains(top) {
                report.hardware.push(top.clone());
            }
        }

        let classification = classifier.classify(&reading.sensor_type);
        if let SensorKind::Unknown(raw) = &classification.kind {
            if !report.unknown_types.contains(raw) {
                report.unknown_types.push(raw.clone());
            }
        }
        *report
            .metrics
            .entry(classification.metric_name)
            .or_insert(0) += 1;
    }

    Ok(report)
}

/// Checks the source and logs the outcome. Failures are warnings only.
pub async fn log_startup_check<S: SensorSource>(source: &S, classifier: &SensorClassifier) {
    info!("🔍 Querying hardware monitor at {}", source.location());

    match check_source(source, classifier).await {
        Ok(report) if report.readings == 0 => {
            warn!("⚠️  Hardware monitor answered but reported no sensors");
            warn!("   Check that OpenHardwareMonitor runs with sufficient privileges");
        }
        Ok(report) => {
            info!(
                "✅ Hardware monitor reachable: {} readings across {} metrics",
                report.readings,
                report.metrics.len()
            );
            // The classifier already warned once per type
            if !report.unknown_types.is_empty() {
                info!(
                    "Sensor types without a unit mapping: {}",
                    report.unknown_types.join(", ")
                );
            }
        }
        Err(e) => {
            warn!("⚠️  Hardware monitor not reachable yet: {}", e);
            warn!("   The exporter will start and keep polling");
        }
    }
}
