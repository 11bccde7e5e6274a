//! Sensor source clients.
//!
//! This module fetches the hierarchical sensor tree published by
//! OpenHardwareMonitor (or LibreHardwareMonitor) at `/data.json` and flattens
//! it into [`SensorReading`]s. Two sources are provided:
//!
//! - [`HttpSensorSource`]: the live agent over HTTP, bounded by a timeout
//! - [`FileSensorSource`]: a saved `data.json` document on disk
//!
//! Neither source retries. A failed fetch is reported as [`SourceError`] and
//! the poll loop decides what to do with it.

use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::Config;
use crate::error::SourceError;

/// Hardware path used for sensors that have no named ancestor.
pub const UNKNOWN_HARDWARE: &str = "Unknown";

/// One observation from the hardware monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    /// Texts of the ancestor nodes, outermost first. Never empty.
    pub hardware_path: Vec<String>,
    pub sensor_name: String,
    pub sensor_type: String,
    pub value: f64,
    /// NodeId of the nearest hardware node (e.g. `/intelcpu/0`), if the tree carries ids.
    pub hardware_id: Option<String>,
}

/// One node of the `data.json` tree.
///
/// Only the fields the exporter needs are modelled; `Min`, `Max`, `ImageURL`
/// and friends are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SensorNode {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<SensorNode>,
    #[serde(default, alias = "Type")]
    pub sensor_type: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default, alias = "SensorId")]
    pub node_id: Option<Value>,
    /// LibreHardwareMonitor puts the hardware identifier here.
    #[serde(default)]
    pub hardware_id: Option<Value>,
}

impl SensorNode {
    /// Path-style identifier such as `/intelcpu/0/temperature/0`.
    fn id_path(&self) -> Option<&str> {
        fn path(v: &Option<Value>) -> Option<&str> {
            v.as_ref()
                .and_then(Value::as_str)
                .filter(|id| id.starts_with('/'))
        }
        path(&self.node_id).or_else(|| path(&self.hardware_id))
    }

    fn id_segments(&self) -> Vec<&str> {
        self.id_path()
            .map(|id| id.split('/').filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    /// The sensor type, if this node is a sensor leaf.
    ///
    /// An explicit `SensorType` wins; otherwise a four-segment NodeId
    /// (`/hardware/index/type/index`) supplies the type.
    fn sensor_kind(&self) -> Option<String> {
        if let Some(t) = self.sensor_type.as_deref().map(str::trim) {
            if !t.is_empty() {
                return Some(t.to_string());
            }
        }

        let segments = self.id_segments();
        if segments.len() == 4 {
            return Some(capitalize(segments[2]));
        }
        None
    }

    fn is_hardware_node(&self) -> bool {
        self.id_segments().len() == 2
    }

    fn label(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

fn capitalize(s: &str) -> String {
    let lower = s.to_ascii_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Parses a sensor value.
///
/// Accepts JSON numbers and OHM-formatted strings like `"52.0 °C"` or
/// `"1,234 RPM"` (first token, thousands separators removed).
pub fn parse_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let token = s.split_whitespace().next()?.replace(',', "");
            token.parse::<f64>().ok()
        }
        _ => None,
    }
}

/// Flattens a sensor tree into readings.
///
/// The root node's own text is not part of any hardware path.
pub fn flatten(root: &SensorNode) -> Vec<SensorReading> {
    let mut readings = Vec::new();
    let mut path = Vec::new();

    for child in &root.children {
        walk(child, &mut path, None, &mut readings);
    }

    readings
}

fn walk(
    node: &SensorNode,
    path: &mut Vec<String>,
    hardware_id: Option<&str>,
    out: &mut Vec<SensorReading>,
) {
    if let Some(sensor_type) = node.sensor_kind() {
        let sensor_name = node
            .label()
            .or(node.id_path())
            .unwrap_or(UNKNOWN_HARDWARE)
            .to_string();

        match node.value.as_ref().and_then(parse_value) {
            Some(value) => {
                let hardware_path = if path.is_empty() {
                    vec![UNKNOWN_HARDWARE.to_string()]
                } else {
                    path.clone()
                };
                trace!("Sensor {}/{} = {}", hardware_path.join("/"), sensor_name, value);
                out.push(SensorReading {
                    hardware_path,
                    sensor_name,
                    sensor_type,
                    value,
                    hardware_id: hardware_id.map(str::to_string),
                });
            }
            None => {
                debug!(
                    "Skipping sensor '{}' ({}): no numeric value",
                    sensor_name, sensor_type
                );
            }
        }
        return;
    }

    let hardware_id = if node.is_hardware_node() {
        node.id_path()
    } else {
        hardware_id
    };

    let pushed = match node.label() {
        Some(text) => {
            path.push(text.to_string());
            true
        }
        None => false,
    };

    for child in &node.children {
        walk(child, path, hardware_id, out);
    }

    if pushed {
        path.pop();
    }
}

/// Parses a `data.json` body and flattens it.
pub fn parse_sensor_tree(body: &[u8]) -> Result<Vec<SensorReading>, SourceError> {
    let root: SensorNode = serde_json::from_slice(body)?;
    Ok(flatten(&root))
}

/// Something that can produce a fresh set of sensor readings.
pub trait SensorSource: Send + Sync {
    /// Fetches and flattens the current sensor tree.
    fn fetch(&self) -> impl Future<Output = Result<Vec<SensorReading>, SourceError>> + Send;

    /// Human-readable location of the source, for logs.
    fn location(&self) -> String;
}

/// Fetches `data.json` from the hardware monitor's built-in web server.
#[derive(Debug, Clone)]
pub struct HttpSensorSource {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpSensorSource {
    /// Creates a client for `url` (the full `data.json` URL).
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|source| SourceError::Request {
                url: url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request_error(&self, source: reqwest::Error) -> SourceError {
        if source.is_timeout() {
            SourceError::Timeout {
                url: self.url.clone(),
                timeout: self.timeout,
            }
        } else {
            SourceError::Request {
                url: self.url.clone(),
                source,
            }
        }
    }
}

impl SensorSource for HttpSensorSource {
    async fn fetch(&self) -> Result<Vec<SensorReading>, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: self.url.clone(),
                status,
            });
        }

        let body = response.bytes().await.map_err(|e| self.request_error(e))?;
        debug!("Fetched {} bytes from {}", body.len(), self.url);
        parse_sensor_tree(&body)
    }

    fn location(&self) -> String {
        self.url.clone()
    }
}

/// Reads a saved `data.json` document from disk on every fetch.
#[derive(Debug, Clone)]
pub struct FileSensorSource {
    path: PathBuf,
}

impl FileSensorSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SensorSource for FileSensorSource {
    async fn fetch(&self) -> Result<Vec<SensorReading>, SourceError> {
        let body = tokio::fs::read(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        parse_sensor_tree(&body)
    }

    fn location(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

/// The source selected by configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredSource {
    Http(HttpSensorSource),
    File(FileSensorSource),
}

impl ConfiguredSource {
    /// A file source when `test_data_file` is set, the HTTP source otherwise.
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        match &config.test_data_file {
            Some(path) => Ok(ConfiguredSource::File(FileSensorSource::new(path))),
            None => Ok(ConfiguredSource::Http(HttpSensorSource::new(
                config.data_url(),
                config.source_timeout(),
            )?)),
        }
    }
}

impl SensorSource for ConfiguredSource {
    async fn fetch(&self) -> Result<Vec<SensorReading>, SourceError> {
        match self {
            ConfiguredSource::Http(source) => source.fetch().await,
            ConfiguredSource::File(source) => source.fetch().await,
        }
    }

    fn location(&self) -> String {
        match self {
            ConfiguredSource::Http(source) => source.location(),
            ConfiguredSource::File(source) => source.location(),
        }
    }
}
