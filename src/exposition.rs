//! Prometheus text exposition of a registry snapshot.
//!
//! Sensor series carry their own observation time and must be rendered from
//! a frozen [`Snapshot`], so they are written directly in text format 0.0.4
//! instead of going through a `prometheus::Registry`.

use std::fmt::Write as FmtWrite;

use crate::registry::Snapshot;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Renders every series of `snapshot`.
///
/// Each metric name gets one `# HELP` and one `# TYPE ... gauge` line
/// followed by all of its series. An empty snapshot renders as an empty
/// string, which is a valid exposition.
pub fn render(snapshot: &Snapshot, expose_timestamps: bool) -> String {
    let mut out = String::with_capacity(snapshot.len() * 96);
    let mut current: Option<&str> = None;

    for (key, series) in snapshot.iter() {
        if current != Some(key.metric_name.as_str()) {
            writeln!(out, "# HELP {} {}", key.metric_name, escape_help(&series.help)).ok();
            writeln!(out, "# TYPE {} gauge", key.metric_name).ok();
            current = Some(key.metric_name.as_str());
        }

        out.push_str(&key.metric_name);
        if !key.labels.is_empty() {
            out.push('{');
            for (i, (name, value)) in key.labels.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write!(out, "{}=\"{}\"", name, escape_label_value(value)).ok();
            }
            out.push('}');
        }

        write!(out, " {}", format_value(series.value)).ok();
        if expose_timestamps {
            write!(out, " {}", series.timestamp.timestamp_millis()).ok();
        }
        out.push('\n');
    }

    out
}

/// Escapes `\`, `"` and newlines in a label value.
pub fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}
