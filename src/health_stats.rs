//! Health statistics for the exporter.
//!
//! Rolling current/average/max/min figures for poll cycles and scrapes,
//! rendered as the plain-text table on `/health`.

use std::collections::VecDeque;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Running statistics for a single metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Point-in-time copy of a [`Stat`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatSnapshot {
    pub current: f64,
    pub avg: f64,
    pub max: f64,
    pub min: f64,
    pub count: u64,
}

/// Thread-safe wrapper for running statistics.
#[derive(Debug, Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    pub fn snapshot(&self) -> StatSnapshot {
        match self.inner.lock() {
            Ok(s) => StatSnapshot {
                current: s.last,
                avg: s.avg(),
                max: s.max,
                min: s.min,
                count: s.count,
            },
            Err(_) => StatSnapshot::default(),
        }
    }
}

/// Sliding window of HTTP request times.
#[derive(Debug)]
pub struct RequestTimestamps {
    inner: Mutex<VecDeque<Instant>>,
}

impl Default for RequestTimestamps {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(256)),
        }
    }
}

impl RequestTimestamps {
    const WINDOW: Duration = Duration::from_secs(600);

    pub fn record(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            let now = Instant::now();
            guard.push_back(now);
            while guard
                .front()
                .is_some_and(|&t| now.duration_since(t) > Self::WINDOW)
            {
                guard.pop_front();
            }
        }
    }

    pub fn count_last_minute(&self) -> u64 {
        match self.inner.lock() {
            Ok(guard) => {
                let now = Instant::now();
                guard
                    .iter()
                    .filter(|&&t| now.duration_since(t) <= Duration::from_secs(60))
                    .count() as u64
            }
            Err(_) => 0,
        }
    }
}

/// Exporter health statistics.
#[derive(Debug)]
pub struct HealthStats {
    // Poll loop
    pub total_polls: AtomicU64,
    pub poll_success_count: AtomicU64,
    pub poll_failure_count: AtomicU64,
    pub poll_duration_seconds: Stat,
    pub readings_per_poll: Stat,
    pub series_count: Stat,
    pub evicted_series: AtomicU64,

    // HTTP server
    pub http_request_timestamps: RequestTimestamps,
    pub metrics_endpoint_calls: AtomicU64,
    pub scrape_duration_ms: Stat,
    pub response_size_kb: Stat,

    pub start_time: Instant,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            total_polls: AtomicU64::new(0),
            poll_success_count: AtomicU64::new(0),
            poll_failure_count: AtomicU64::new(0),
            poll_duration_seconds: Stat::default(),
            readings_per_poll: Stat::default(),
            series_count: Stat::default(),
            evicted_series: AtomicU64::new(0),
            http_request_timestamps: RequestTimestamps::default(),
            metrics_endpoint_calls: AtomicU64::new(0),
            scrape_duration_ms: Stat::default(),
            response_size_kb: Stat::default(),
            start_time: Instant::now(),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_poll_success(&self, duration_seconds: f64, readings: usize, series: usize) {
        self.total_polls.fetch_add(1, Ordering::Relaxed);
        self.poll_success_count.fetch_add(1, Ordering::Relaxed);
        self.poll_duration_seconds.add_sample(duration_seconds);
        self.readings_per_poll.add_sample(readings as f64);
        self.series_count.add_sample(series as f64);
    }

    pub fn record_poll_failure(&self, duration_seconds: f64) {
        self.total_polls.fetch_add(1, Ordering::Relaxed);
        self.poll_failure_count.fetch_add(1, Ordering::Relaxed);
        self.poll_duration_seconds.add_sample(duration_seconds);
    }

    pub fn record_evicted(&self, count: usize) {
        self.evicted_series
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_http_request(&self) {
        self.http_request_timestamps.record();
    }

    pub fn record_scrape(&self, duration_ms: f64, body_bytes: usize) {
        self.metrics_endpoint_calls.fetch_add(1, Ordering::Relaxed);
        self.scrape_duration_ms.add_sample(duration_ms);
        self.response_size_kb.add_sample(body_bytes as f64 / 1024.0);
    }

    pub fn get_poll_success_rate(&self) -> f64 {
        let success = self.poll_success_count.load(Ordering::Relaxed);
        let failure = self.poll_failure_count.load(Ordering::Relaxed);
        let total = success + failure;
        if total == 0 {
            100.0
        } else {
            (success as f64 / total as f64) * 100.0
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn render_table(&self) -> String {
        let pd = self.poll_duration_seconds.snapshot();
        let rp = self.readings_per_poll.snapshot();
        let sc = self.series_count.snapshot();
        let sd = self.scrape_duration_ms.snapshot();
        let rs = self.response_size_kb.snapshot();

        let total = self.total_polls.load(Ordering::Relaxed);
        let failures = self.poll_failure_count.load(Ordering::Relaxed);
        let evicted = self.evicted_series.load(Ordering::Relaxed);
        let success_rate = self.get_poll_success_rate();
        let requests_last_minute = self.http_request_timestamps.count_last_minute();
        let metrics_calls = self.metrics_endpoint_calls.load(Ordering::Relaxed);

        let mut out = String::new();

        writeln!(out, "EXPORTER INTERNAL STATS").ok();
        writeln!(out, "=======================").ok();
        writeln!(out).ok();
        header_row(&mut out);

        writeln!(out).ok();
        writeln!(out, "POLL LOOP").ok();
        writeln!(out, "---------").ok();
        stat_row(&mut out, "poll_duration (s)", pd, 3);
        stat_row(&mut out, "readings_per_poll", rp, 0);
        stat_row(&mut out, "exported_series", sc, 0);
        value_row(&mut out, "poll_success_rate (%)", format!("{:.1}", success_rate));
        value_row(&mut out, "polls_total", total.to_string());
        value_row(&mut out, "poll_failures_total", failures.to_string());
        value_row(&mut out, "evicted_series_total", evicted.to_string());

        writeln!(out).ok();
        writeln!(out, "HTTP SERVER").ok();
        writeln!(out, "-----------").ok();
        value_row(
            &mut out,
            "http_requests_last_minute",
            requests_last_minute.to_string(),
        );
        value_row(&mut out, "metrics_requests_total", metrics_calls.to_string());
        stat_row(&mut out, "scrape_duration (ms)", sd, 2);
        stat_row(&mut out, "response_size (KB)", rs, 1);

        out
    }
}

const LEFT_COL: usize = 26;
const COL_W: usize = 12;

fn header_row(out: &mut String) {
    writeln!(
        out,
        "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
        "",
        "current",
        "average",
        "max",
        "min",
        left = LEFT_COL,
        col = COL_W
    )
    .ok();
}

fn stat_row(out: &mut String, name: &str, s: StatSnapshot, precision: usize) {
    writeln!(
        out,
        "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
        name,
        format!("{:.p$}", s.current, p = precision),
        format!("{:.p$}", s.avg, p = precision.max(1)),
        format!("{:.p$}", s.max, p = precision),
        format!("{:.p$}", s.min, p = precision),
        left = LEFT_COL,
        col = COL_W
    )
    .ok();
}

fn value_row(out: &mut String, name: &str, value: String) {
    writeln!(
        out,
        "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
        name,
        value,
        "N/A",
        "N/A",
        "N/A",
        left = LEFT_COL,
        col = COL_W
    )
    .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stat() {
        let mut stat = RunningStat::default();
        stat.add(2.0);
        stat.add(4.0);
        stat.add(0.0);
        assert_eq!(stat.avg(), 2.0);
        assert_eq!(stat.min, 0.0);
        assert_eq!(stat.max, 4.0);
        assert_eq!(stat.last, 0.0);
    }

    #[test]
    fn test_empty_stat_snapshot() {
        let stat = Stat::default();
        assert_eq!(stat.snapshot(), StatSnapshot::default());
    }

    #[test]
    fn test_poll_success_rate() {
        let stats = HealthStats::new();
        assert_eq!(stats.get_poll_success_rate(), 100.0);

        stats.record_poll_success(0.1, 12, 12);
        stats.record_poll_success(0.1, 12, 12);
        stats.record_poll_success(0.1, 12, 12);
        stats.record_poll_failure(5.0);

        assert_eq!(stats.get_poll_success_rate(), 75.0);
        assert_eq!(stats.total_polls.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_render_table_sections() {
        let stats = HealthStats::new();
        stats.record_poll_success(0.25, 40, 40);
        stats.record_scrape(1.5, 4096);
        stats.record_http_request();

        let table = stats.render_table();
        assert!(table.contains("POLL LOOP"));
        assert!(table.contains("HTTP SERVER"));
        assert!(table.contains("readings_per_poll"));
        assert!(table.contains("metrics_requests_total"));
    }
}
