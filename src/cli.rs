//! CLI arguments and subcommands for ohm-exporter.
//!
//! Flags that have an environment variable read it through clap's `env`
//! support, so a CLI flag beats the variable and both beat the config file.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug, Default)]
#[command(
    name = "ohm-exporter",
    about = "Prometheus exporter for OpenHardwareMonitor sensor readings",
    long_about = "Prometheus exporter for OpenHardwareMonitor sensor readings.\n\n\
                  Polls the hardware monitor's data.json endpoint on a fixed interval, \
                  classifies every sensor into a canonical metric name and unit, and serves \
                  the latest values in Prometheus text format.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long, env = "EXPORTER_PORT")]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long, env = "EXPORTER_BIND")]
    pub bind: Option<IpAddr>,

    /// Path the metrics are served on
    #[arg(long, env = "EXPORTER_METRICS_PATH")]
    pub metrics_path: Option<String>,

    /// Hostname of the hardware monitor's web server
    #[arg(long, env = "OHM_HOST")]
    pub source_host: Option<String>,

    /// Port of the hardware monitor's web server
    #[arg(long, env = "OHM_PORT")]
    pub source_port: Option<u16>,

    /// Full URL of the sensor tree (overrides --source-host/--source-port)
    #[arg(long, env = "OHM_URL")]
    pub source_url: Option<String>,

    /// Seconds between poll cycles
    #[arg(long, env = "POLLING_INTERVAL_SECONDS")]
    pub poll_interval: Option<u64>,

    /// Timeout in seconds for one request to the hardware monitor
    #[arg(long, env = "OHM_TIMEOUT_SECONDS")]
    pub source_timeout: Option<u64>,

    /// Drop series not refreshed for this many seconds
    #[arg(long, env = "SERIES_TTL_SECONDS")]
    pub series_ttl: Option<u64>,

    /// Read the sensor tree from a JSON file instead of the hardware monitor
    #[arg(short = 't', long, env = "OHM_TEST_DATA_FILE")]
    pub test_data_file: Option<PathBuf>,

    /// Log level (overrides the config file)
    #[arg(long, value_enum, env = "LOG_LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Disable internal ohm_exporter_* metrics
    #[arg(long)]
    pub disable_telemetry: bool,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and query the hardware monitor once
    Check {
        /// Only validate the configuration
        #[arg(long)]
        skip_source: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Fetch and classify sensors without starting the server
    Test {
        /// Number of test iterations
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Print every exported series
        #[arg(long)]
        verbose: bool,
    },

    /// List the sensor classification table
    Sensors,

    /// Generate a synthetic data.json sensor tree
    GenerateTestdata {
        /// Output file path
        #[arg(short = 'o', long, default_value = "data.json")]
        output: PathBuf,

        /// Number of CPU cores to simulate
        #[arg(long, default_value_t = 8)]
        cores: usize,

        /// Number of storage devices to simulate
        #[arg(long, default_value_t = 2)]
        disks: usize,

        /// Seed for reproducible values
        #[arg(long)]
        seed: Option<u64>,
    },
}
