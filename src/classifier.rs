//! Sensor classification.
//!
//! Maps the raw `SensorType` strings reported by the hardware monitor to
//! canonical Prometheus metric names (`ohm_{type}_{unit}`), units and help
//! texts. The table is compiled in; unknown types fall back to
//! `ohm_{type}_unknown` and are logged once per classifier instance.

use ahash::AHashSet as HashSet;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

use crate::source::SensorReading;

/// Prefix shared by every exported sensor metric.
pub const METRIC_PREFIX: &str = "ohm";

/// Unit used for sensor types missing from the table.
pub const UNKNOWN_UNIT: &str = "unknown";

/// Label names attached to every sensor series.
pub const LABEL_SENSOR: &str = "sensor";
pub const LABEL_HARDWARE: &str = "hardware";
pub const LABEL_HARDWARE_TYPE: &str = "hardware_type";

/// Hardware category used when the tree carries no hardware ids.
pub const UNKNOWN_HARDWARE_TYPE: &str = "Unknown";

static INVALID_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9_]").expect("static regex"));

/// Known sensor categories, plus an explicit variant for everything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Temperature,
    Power,
    Fan,
    Load,
    Clock,
    Voltage,
    Data,
    SmallData,
    Throughput,
    Level,
    Control,
    Humidity,
    Noise,
    Flow,
    Factor,
    Unknown(String),
}

/// Unit and description for a known sensor kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationRule {
    pub unit: &'static str,
    pub description: &'static str,
}

impl SensorKind {
    /// Every kind that has a classification rule.
    pub const KNOWN: &'static [SensorKind] = &[
        SensorKind::Temperature,
        SensorKind::Power,
        SensorKind::Fan,
        SensorKind::Load,
        SensorKind::Clock,
        SensorKind::Voltage,
        SensorKind::Data,
        SensorKind::SmallData,
        SensorKind::Throughput,
        SensorKind::Level,
        SensorKind::Control,
        SensorKind::Humidity,
        SensorKind::Noise,
        SensorKind::Flow,
        SensorKind::Factor,
    ];

    /// Case-insensitive lookup of a raw sensor type.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.to_ascii_lowercase().as_str() {
            "temperature" => SensorKind::Temperature,
            "power" => SensorKind::Power,
            "fan" => SensorKind::Fan,
            "load" => SensorKind::Load,
            "clock" => SensorKind::Clock,
            "voltage" => SensorKind::Voltage,
            "data" => SensorKind::Data,
            "smalldata" => SensorKind::SmallData,
            "throughput" => SensorKind::Throughput,
            "level" => SensorKind::Level,
            "control" => SensorKind::Control,
            "humidity" => SensorKind::Humidity,
            "noise" => SensorKind::Noise,
            "flow" => SensorKind::Flow,
            "factor" => SensorKind::Factor,
            _ => SensorKind::Unknown(raw.to_string()),
        }
    }

    /// Canonical type name as the hardware monitor spells it.
    pub fn as_str(&self) -> &str {
        match self {
            SensorKind::Temperature => "Temperature",
            SensorKind::Power => "Power",
            SensorKind::Fan => "Fan",
            SensorKind::Load => "Load",
            SensorKind::Clock => "Clock",
            SensorKind::Voltage => "Voltage",
            SensorKind::Data => "Data",
            SensorKind::SmallData => "SmallData",
            SensorKind::Throughput => "Throughput",
            SensorKind::Level => "Level",
            SensorKind::Control => "Control",
            SensorKind::Humidity => "Humidity",
            SensorKind::Noise => "Noise",
            SensorKind::Flow => "Flow",
            SensorKind::Factor => "Factor",
            SensorKind::Unknown(raw) => raw,
        }
    }

    /// The classification rule, or `None` for unknown kinds.
    pub fn rule(&self) -> Option<ClassificationRule> {
        let (unit, description) = match self {
            SensorKind::Temperature => ("celsius", "Temperature in degrees Celsius"),
            SensorKind::Power => ("watts", "Power usage in Watts"),
            SensorKind::Fan => ("rpm", "Fan speed in RPM"),
            SensorKind::Load => ("percent", "Load as a percentage"),
            SensorKind::Clock => ("megahertz", "Clock speed in MHz"),
            SensorKind::Voltage => ("volts", "Voltage in Volts"),
            SensorKind::Data => ("gigabytes", "Data amount in Gigabytes"),
            SensorKind::SmallData => ("megabytes", "Data amount in Megabytes"),
            SensorKind::Throughput => ("bytes", "Throughput in Bytes/s"),
            SensorKind::Level => ("percent", "Level as a percentage"),
            SensorKind::Control => ("percent", "Control value as a percentage"),
            SensorKind::Humidity => ("percent", "Relative humidity as a percentage"),
            SensorKind::Noise => ("decibels", "Noise level in dB"),
            SensorKind::Flow => ("liters_per_hour", "Flow rate in liters per hour"),
            SensorKind::Factor => ("ratio", "Dimensionless factor"),
            SensorKind::Unknown(_) => return None,
        };
        Some(ClassificationRule { unit, description })
    }
}

/// Name, unit and help text resolved for one sensor type.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub kind: SensorKind,
    pub metric_name: String,
    pub unit: &'static str,
    pub help: String,
}

/// Identity of one exported series plus its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDescriptor {
    pub metric_name: String,
    pub unit: &'static str,
    pub help: String,
    /// Sorted by label name.
    pub labels: Vec<(String, String)>,
}

/// Lower-cases a sensor type and replaces anything outside `[a-z0-9_]`.
pub fn sanitize_type_name(sensor_type: &str) -> String {
    INVALID_NAME_CHARS
        .replace_all(&sensor_type.trim().to_ascii_lowercase(), "_")
        .into_owned()
}

/// Builds `ohm_{type}_{unit}`.
pub fn metric_name(sensor_type: &str, unit: &str) -> String {
    format!(
        "{}_{}_{}",
        METRIC_PREFIX,
        sanitize_type_name(sensor_type),
        unit
    )
}

/// Hardware id prefixes and the category they map to. Order matters: the
/// first key contained in the id's first segment wins.
const HARDWARE_TYPES: &[(&str, &str)] = &[
    ("intelcpu", "CPU"),
    ("amdcpu", "CPU"),
    ("cpu", "CPU"),
    ("nvidiagpu", "GPU"),
    ("amdgpu", "GPU"),
    ("intelgpu", "GPU"),
    ("gpu", "GPU"),
    ("hdd", "Storage"),
    ("ssd", "Storage"),
    ("nvme", "Storage"),
    ("storage", "Storage"),
    ("ram", "RAM"),
    ("memory", "RAM"),
    ("lpc", "Motherboard"),
    ("superio", "Motherboard"),
    ("motherboard", "Motherboard"),
    ("nic", "Network"),
    ("network", "Network"),
    ("battery", "Battery"),
];

/// The classification table as `(kind, rule)` pairs, in table order.
pub fn known_kinds() -> impl Iterator<Item = (&'static SensorKind, ClassificationRule)> {
    SensorKind::KNOWN
        .iter()
        .filter_map(|kind| kind.rule().map(|rule| (kind, rule)))
}

/// Infers a hardware category from an id like `/intelcpu/0` or `/lpc/nct6798d`.
pub fn infer_hardware_type(hardware_id: Option<&str>) -> String {
    let segment = match hardware_id
        .and_then(|id| id.trim_matches('/').split('/').next())
        .map(str::to_ascii_lowercase)
    {
        Some(s) if !s.is_empty() => s,
        _ => return UNKNOWN_HARDWARE_TYPE.to_string(),
    };

    HARDWARE_TYPES
        .iter()
        .find(|(key, _)| segment.contains(key))
        .map(|(_, category)| category.to_string())
        .unwrap_or_else(|| segment.to_ascii_uppercase())
}

/// Classifies sensor readings and remembers which unknown types were reported.
///
/// Constructed once at startup and shared by the poll loop.
#[derive(Debug, Default)]
pub struct SensorClassifier {
    warned: Mutex<HashSet<String>>,
    constant_labels: Vec<(String, String)>,
}

impl SensorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a classifier that adds `labels` to every series.
    ///
    /// Constant labels never override `sensor`, `hardware` or `hardware_type`.
    pub fn with_constant_labels(labels: &BTreeMap<String, String>) -> Self {
        let constant_labels = labels
            .iter()
            .filter(|(k, _)| {
                !matches!(
                    k.as_str(),
                    LABEL_SENSOR | LABEL_HARDWARE | LABEL_HARDWARE_TYPE
                )
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Self {
            warned: Mutex::new(HashSet::new()),
            constant_labels,
        }
    }

    /// Resolves the metric name, unit and help text for a raw sensor type.
    pub fn classify(&self, sensor_type: &str) -> Classification {
        let kind = SensorKind::parse(sensor_type);

        match kind.rule() {
            Some(rule) => Classification {
                metric_name: metric_name(kind.as_str(), rule.unit),
                unit: rule.unit,
                help: rule.description.to_string(),
                kind,
            },
            None => {
                let raw = kind.as_str().to_string();
                if self.mark_warned(&raw) {
                    warn!(
                        sensor_type = %raw,
                        "Unknown sensor type, exporting as {}",
                        metric_name(&raw, UNKNOWN_UNIT)
                    );
                }
                Classification {
                    metric_name: metric_name(&raw, UNKNOWN_UNIT),
                    unit: UNKNOWN_UNIT,
                    help: format!("OpenHardwareMonitor {} sensor readings", raw),
                    kind,
                }
            }
        }
    }

    /// Builds the full series descriptor for a reading.
    pub fn describe(&self, reading: &SensorReading) -> MetricDescriptor {
        let classification = self.classify(&reading.sensor_type);

        let mut labels = Vec::with_capacity(3 + self.constant_labels.len());
        labels.push((LABEL_SENSOR.to_string(), reading.sensor_name.clone()));
        labels.push((
            LABEL_HARDWARE.to_string(),
            reading.hardware_path.join("/"),
        ));
        labels.push((
            LABEL_HARDWARE_TYPE.to_string(),
            infer_hardware_type(reading.hardware_id.as_deref()),
        ));
        labels.extend(self.constant_labels.iter().cloned());
        labels.sort_by(|a, b| a.0.cmp(&b.0));

        MetricDescriptor {
            metric_name: classification.metric_name,
            unit: classification.unit,
            help: classification.help,
            labels,
        }
    }

    /// Unknown sensor types seen so far, sorted.
    pub fn unknown_types(&self) -> Vec<String> {
        let warned = self.warned.lock().unwrap_or_else(PoisonError::into_inner);
        let mut types: Vec<String> = warned.iter().cloned().collect();
        types.sort();
        types
    }

    /// Number of distinct unknown types warned about.
    pub fn warned_count(&self) -> usize {
        self.warned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true the first time a given unknown type is seen.
    fn mark_warned(&self, raw: &str) -> bool {
        self.warned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(raw.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(sensor_type: &str) -> SensorReading {
        SensorReading {
            hardware_path: vec!["Intel Core i7".to_string(), "Temperatures".to_string()],
            sensor_name: "CPU Package".to_string(),
            sensor_type: sensor_type.to_string(),
            value: 50.0,
            hardware_id: Some("/intelcpu/0".to_string()),
        }
    }

    #[test]
    fn test_every_known_kind_classifies_to_its_unit() {
        let classifier = SensorClassifier::new();
        for kind in SensorKind::KNOWN {
            let rule = kind.rule().expect("known kinds have rules");
            let c = classifier.classify(kind.as_str());
            assert_eq!(c.unit, rule.unit);
            assert_eq!(
                c.metric_name,
                format!("ohm_{}_{}", kind.as_str().to_ascii_lowercase(), rule.unit)
            );
            assert_eq!(&c.kind, kind);
        }
        assert_eq!(classifier.warned_count(), 0);
        assert_eq!(known_kinds().count(), SensorKind::KNOWN.len());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let classifier = SensorClassifier::new();
        assert_eq!(
            classifier.classify("temperature").metric_name,
            "ohm_temperature_celsius"
        );
        assert_eq!(classifier.classify("FAN").metric_name, "ohm_fan_rpm");
        assert_eq!(
            classifier.classify("SmallData").metric_name,
            "ohm_smalldata_megabytes"
        );
    }

    #[test]
    fn test_unknown_type_falls_back_and_warns_once() {
        let classifier = SensorClassifier::new();

        for _ in 0..5 {
            let c = classifier.classify("Frequency");
            assert_eq!(c.metric_name, "ohm_frequency_unknown");
            assert_eq!(c.unit, UNKNOWN_UNIT);
            assert_eq!(c.kind, SensorKind::Unknown("Frequency".to_string()));
            assert!(c.help.contains("Frequency"));
        }
        classifier.classify("frequency");
        assert_eq!(classifier.warned_count(), 1);

        classifier.classify("Energy");
        assert_eq!(classifier.warned_count(), 2);
        assert_eq!(classifier.unknown_types(), vec!["energy", "frequency"]);
    }

    #[test]
    fn test_unknown_type_name_is_sanitized() {
        let classifier = SensorClassifier::new();
        let c = classifier.classify("Time Span");
        assert_eq!(c.metric_name, "ohm_time_span_unknown");
    }

    #[test]
    fn test_describe_labels() {
        let classifier = SensorClassifier::new();
        let d = classifier.describe(&reading("Temperature"));

        assert_eq!(d.metric_name, "ohm_temperature_celsius");
        assert_eq!(
            d.labels,
            vec![
                ("hardware".to_string(), "Intel Core i7/Temperatures".to_string()),
                ("hardware_type".to_string(), "CPU".to_string()),
                ("sensor".to_string(), "CPU Package".to_string()),
            ]
        );
    }

    #[test]
    fn test_constant_labels_do_not_override_builtin() {
        let mut extra = BTreeMap::new();
        extra.insert("host".to_string(), "gaming-rig".to_string());
        extra.insert("sensor".to_string(), "ignored".to_string());

        let classifier = SensorClassifier::with_constant_labels(&extra);
        let d = classifier.describe(&reading("Load"));

        assert!(d.labels.contains(&("host".to_string(), "gaming-rig".to_string())));
        assert!(d.labels.contains(&("sensor".to_string(), "CPU Package".to_string())));
        assert_eq!(d.labels.len(), 4);
    }

    #[test]
    fn test_infer_hardware_type() {
        assert_eq!(infer_hardware_type(Some("/intelcpu/0")), "CPU");
        assert_eq!(infer_hardware_type(Some("/nvidiagpu/0")), "GPU");
        assert_eq!(infer_hardware_type(Some("/lpc/nct6798d")), "Motherboard");
        assert_eq!(infer_hardware_type(Some("/hdd/1")), "Storage");
        assert_eq!(infer_hardware_type(Some("/mainboard")), "MAINBOARD");
        assert_eq!(infer_hardware_type(None), "Unknown");
        assert_eq!(infer_hardware_type(Some("/")), "Unknown");
    }
}
