//! Sensors command implementation.
//!
//! Lists the sensor classification table.

use crate::classifier::{known_kinds, metric_name, METRIC_PREFIX, UNKNOWN_UNIT};

/// Prints every known sensor type with its metric name and unit.
pub fn command_sensors() -> anyhow::Result<()> {
    println!("🌡️  OHM Exporter - Sensor Classification");
    println!("========================================\n");

    println!("{:12} | {:36} | {:16} | {}", "Type", "Metric", "Unit", "Description");
    println!("{}", "─".repeat(100));

    for (kind, rule) in known_kinds() {
        println!(
            "{:12} | {:36} | {:16} | {}",
            kind.as_str(),
            metric_name(kind.as_str(), rule.unit),
            rule.unit,
            rule.description
        );
    }

    println!(
        "\nAny other type is exported as {}_<type>_{} and logged once.",
        METRIC_PREFIX, UNKNOWN_UNIT
    );
    println!("Every series carries the labels: sensor, hardware, hardware_type.");
    Ok(())
}
