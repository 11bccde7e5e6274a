//! Configuration management for ohm-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.
//!
//! Precedence: CLI flag > environment variable > config file > built-in default.

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::classifier::{LABEL_HARDWARE, LABEL_HARDWARE_TYPE, LABEL_SENSOR};
use crate::cli::{Args, ConfigFormat, LogLevel};
use crate::error::ExporterError;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9877;
pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_SOURCE_HOST: &str = "localhost";
pub const DEFAULT_SOURCE_PORT: u16 = 8086;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 5;

/// Routes served next to the metrics path.
pub const RESERVED_PATHS: &[&str] = &["/", "/health", "/config"];

/// Config files tried in order when `--config` is not given.
const DEFAULT_CONFIG_FILES: &[&str] = &[
    "./ohm-exporter.yaml",
    "./ohm-exporter.yml",
    "./ohm-exporter.json",
    "./ohm-exporter.toml",
];

static LABEL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("static regex"));

/// Exporter configuration.
///
/// Every field is optional in files; anything left out keeps its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,
    #[serde(alias = "metrics-path")]
    pub metrics_path: Option<String>,

    // Sensor source
    #[serde(alias = "source-host")]
    pub source_host: Option<String>,
    #[serde(alias = "source-port")]
    pub source_port: Option<u16>,
    /// Full URL of the sensor tree; overrides host and port.
    #[serde(alias = "source-url")]
    pub source_url: Option<String>,
    #[serde(alias = "source-timeout-secs")]
    pub source_timeout_secs: Option<u64>,

    /// Path to a saved data.json (replaces the HTTP source)
    #[serde(alias = "test-data-file")]
    pub test_data_file: Option<PathBuf>,

    // Polling
    #[serde(alias = "poll-interval-secs")]
    pub poll_interval_secs: Option<u64>,
    /// Unset disables stale-series eviction.
    #[serde(alias = "series-ttl-secs")]
    pub series_ttl_secs: Option<u64>,

    // Exposition
    #[serde(alias = "expose-timestamps")]
    pub expose_timestamps: Option<bool>,

    // Feature flags
    #[serde(alias = "enable-health")]
    pub enable_health: Option<bool>,
    #[serde(alias = "enable-telemetry")]
    pub enable_telemetry: Option<bool>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<LogLevel>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,

    /// Extra labels added to every sensor series. Kept last so TOML
    /// output places the table after plain values.
    #[serde(alias = "constant-labels")]
    pub constant_labels: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            metrics_path: Some(DEFAULT_METRICS_PATH.to_string()),
            source_host: Some(DEFAULT_SOURCE_HOST.to_string()),
            source_port: Some(DEFAULT_SOURCE_PORT),
            source_url: None,
            source_timeout_secs: None,
            test_data_file: None,
            poll_interval_secs: Some(DEFAULT_POLL_INTERVAL_SECS),
            series_ttl_secs: None,
            expose_timestamps: Some(false),
            enable_health: Some(true),
            enable_telemetry: Some(true),
            log_level: Some(LogLevel::Info),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
            constant_labels: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn bind_addr(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Socket address the exposition endpoint binds to.
    pub fn listen_addr(&self) -> Result<SocketAddr, ExporterError> {
        let ip: IpAddr = self.bind_addr().parse().map_err(|_| {
            ExporterError::Config(format!("Invalid bind address '{}'", self.bind_addr()))
        })?;
        Ok(SocketAddr::new(ip, self.port()))
    }

    pub fn metrics_path(&self) -> &str {
        self.metrics_path.as_deref().unwrap_or(DEFAULT_METRICS_PATH)
    }

    /// URL of the sensor tree document.
    ///
    /// A configured `source_url` is used as-is when it already names a
    /// `.json` document; otherwise `/data.json` is appended.
    pub fn data_url(&self) -> String {
        match self.source_url.as_deref() {
            Some(url) if url.ends_with(".json") => url.to_string(),
            Some(url) => format!("{}/data.json", url.trim_end_matches('/')),
            None => format!(
                "http://{}:{}/data.json",
                self.source_host.as_deref().unwrap_or(DEFAULT_SOURCE_HOST),
                self.source_port.unwrap_or(DEFAULT_SOURCE_PORT)
            ),
        }
    }

    /// Where readings come from, for display.
    pub fn source_location(&self) -> String {
        match &self.test_data_file {
            Some(path) => format!("file://{}", path.display()),
            None => self.data_url(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS))
    }

    /// Request timeout. Unset, it is the default capped at the poll interval.
    pub fn source_timeout(&self) -> Duration {
        let secs = self.source_timeout_secs.unwrap_or_else(|| {
            DEFAULT_SOURCE_TIMEOUT_SECS.min(self.poll_interval().as_secs())
        });
        Duration::from_secs(secs)
    }

    /// `None` when eviction is disabled.
    pub fn series_ttl(&self) -> Option<Duration> {
        self.series_ttl_secs.map(Duration::from_secs)
    }

    pub fn expose_timestamps(&self) -> bool {
        self.expose_timestamps.unwrap_or(false)
    }

    pub fn health_enabled(&self) -> bool {
        self.enable_health.unwrap_or(true)
    }

    pub fn telemetry_enabled(&self) -> bool {
        self.enable_telemetry.unwrap_or(true)
    }

    pub fn tls_enabled(&self) -> bool {
        self.enable_tls.unwrap_or(false)
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level.unwrap_or(LogLevel::Info)
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), ExporterError> {
    fn invalid(msg: String) -> Result<(), ExporterError> {
        Err(ExporterError::Config(msg))
    }

    cfg.listen_addr()?;

    // Polling
    let interval = cfg.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
    if interval == 0 {
        return invalid("poll_interval_secs must be greater than 0".into());
    }
    if let Some(timeout) = cfg.source_timeout_secs {
        if timeout == 0 {
            return invalid("source_timeout_secs must be greater than 0".into());
        }
        if timeout > interval {
            return invalid(format!(
                "source_timeout_secs ({}) must not exceed poll_interval_secs ({})",
                timeout, interval
            ));
        }
    }
    if cfg.series_ttl_secs == Some(0) {
        return invalid("series_ttl_secs must be greater than 0 when set".into());
    }

    // Metrics path
    let path = cfg.metrics_path();
    if !path.starts_with('/') {
        return invalid(format!("metrics_path '{}' must start with '/'", path));
    }
    if path.contains([':', '*', '{', '}']) {
        return invalid(format!(
            "metrics_path '{}' must not contain route parameters (':', '*', '{{', '}}')",
            path
        ));
    }
    if RESERVED_PATHS.contains(&path) {
        return invalid(format!(
            "metrics_path '{}' collides with a built-in endpoint",
            path
        ));
    }

    // Source
    match &cfg.test_data_file {
        Some(file) => {
            if !file.exists() {
                return invalid(format!("Test data file not found: {}", file.display()));
            }
        }
        None => {
            let url = cfg.data_url();
            match reqwest::Url::parse(&url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => {
                    return invalid(format!(
                        "Unsupported source URL scheme '{}' in {}",
                        parsed.scheme(),
                        url
                    ));
                }
                Err(e) => return invalid(format!("Invalid source URL '{}': {}", url, e)),
            }
        }
    }

    // Constant labels
    for name in cfg.constant_labels.keys() {
        if !LABEL_NAME.is_match(name) || name.starts_with("__") {
            return invalid(format!("Invalid constant label name '{}'", name));
        }
        if matches!(
            name.as_str(),
            LABEL_SENSOR | LABEL_HARDWARE | LABEL_HARDWARE_TYPE
        ) {
            return invalid(format!(
                "Constant label '{}' is reserved for sensor series",
                name
            ));
        }
    }

    // TLS validation
    if cfg.tls_enabled() {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return invalid(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return invalid("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return invalid("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "certificate")?;
                check_pem_file(key, "private key")?;
            }
        }
    }

    Ok(())
}

fn check_pem_file(path: &str, what: &str) -> Result<(), ExporterError> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(ExporterError::Config(format!(
            "TLS {} file is empty: {}",
            what, path
        ))),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ExporterError::Config(
            format!("TLS {} file not found: {}", what, path),
        )),
        Err(e) => Err(ExporterError::Config(format!(
            "TLS {} file is not readable: {} ({})",
            what, path, e
        ))),
    }
}

/// Resolves configuration from CLI args (and their env vars), config file, and defaults.
pub fn resolve_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(port) = args.port {
        config.port = Some(port);
    }
    if let Some(path) = &args.metrics_path {
        config.metrics_path = Some(path.clone());
    }

    // Source
    if let Some(host) = &args.source_host {
        config.source_host = Some(host.clone());
    }
    if let Some(port) = args.source_port {
        config.source_port = Some(port);
    }
    if let Some(url) = &args.source_url {
        config.source_url = Some(url.clone());
    }
    if let Some(timeout) = args.source_timeout {
        config.source_timeout_secs = Some(timeout);
    }
    if let Some(test_file) = &args.test_data_file {
        config.test_data_file = Some(test_file.clone());
    }

    // Polling
    if let Some(interval) = args.poll_interval {
        config.poll_interval_secs = Some(interval);
    }
    if let Some(ttl) = args.series_ttl {
        config.series_ttl_secs = Some(ttl);
    }

    if let Some(level) = args.log_level {
        config.log_level = Some(level);
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Loads a config file, or the first default file found.
///
/// No file at all yields the defaults; an explicitly named file must exist.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                anyhow::bail!("Config file not found: {}", p.display());
            }
            p.to_path_buf()
        }
        None => match DEFAULT_CONFIG_FILES.iter().map(Path::new).find(|p| p.exists()) {
            Some(p) => p.to_path_buf(),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?,
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?,
    };

    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Serializes configuration in the requested format.
pub fn render_config(config: &Config, format: ConfigFormat) -> anyhow::Result<String> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> anyhow::Result<()> {
    println!("{}", render_config(config, format)?);
    Ok(())
}
