//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files. `-` as output writes to stdout.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> anyhow::Result<()> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| {
        PathBuf::from(match format {
            ConfigFormat::Yaml => "ohm-exporter.yaml",
            ConfigFormat::Json => "ohm-exporter.json",
            ConfigFormat::Toml => "ohm-exporter.toml",
        })
    });

    let mut content = render_config(&config, format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# OHM Exporter Configuration
# ===========================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 9877                   # HTTP port
# metrics_path: "/metrics"     # Path of the Prometheus endpoint
#
# Sensor Source
# -------------
# source_host: "localhost"     # OpenHardwareMonitor web server host
# source_port: 8086            # OpenHardwareMonitor web server port
# source_url: null             # Full URL, overrides host/port (e.g. http://rig:8086/data.json)
# source_timeout_secs: 5       # Request timeout (default 5, capped at the poll interval)
# test_data_file: null         # Read a saved data.json instead of polling
#
# Polling
# -------
# poll_interval_secs: 10       # Seconds between poll cycles
# series_ttl_secs: null        # Drop sensors not seen for N seconds (null = keep forever)
#
# Exposition
# ----------
# expose_timestamps: false     # Append observation timestamps to samples
# constant_labels: {}          # Extra labels on every series, e.g. {host: "gaming-rig"}
#
# Feature Flags
# -------------
# enable_health: true          # Enable /health endpoint
# enable_telemetry: true       # Export ohm_exporter_* metrics
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false            # Enable HTTPS (default: false)
# tls_cert_path: null          # Path to TLS certificate (PEM format)
# tls_key_path: null           # Path to TLS private key (PEM format)
"#;

    format!("{comments}\n{yaml}")
}
