//! In-memory store of the latest value of every sensor series.
//!
//! The registry keeps one immutable generation of series behind an `Arc`.
//! Writers build the next generation off to the side and swap it in, so a
//! scrape either sees all of a poll cycle's updates or none of them.
//! Readers only clone the `Arc` under the lock.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;

use crate::classifier::MetricDescriptor;

/// Unique identity of a series: metric name plus sorted labels.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey {
    pub metric_name: String,
    pub labels: Vec<(String, String)>,
}

impl From<&MetricDescriptor> for SeriesKey {
    fn from(descriptor: &MetricDescriptor) -> Self {
        let mut labels = descriptor.labels.clone();
        labels.sort();
        Self {
            metric_name: descriptor.metric_name.clone(),
            labels,
        }
    }
}

/// Latest observation of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub help: String,
    pub unit: &'static str,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// One upsert: descriptor, value and observation time.
pub type Sample = (MetricDescriptor, f64, DateTime<Utc>);

type Generation = BTreeMap<SeriesKey, MetricSeries>;

/// Frozen, ordered view of the registry.
///
/// Series are ordered by metric name, then labels, so all series of one
/// metric are adjacent.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    series: Arc<Generation>,
}

impl Snapshot {
    pub fn iter(&self) -> impl Iterator<Item = (&SeriesKey, &MetricSeries)> {
        self.series.iter()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Looks up a series by name and labels (labels in any order).
    pub fn get(&self, metric_name: &str, labels: &[(&str, &str)]) -> Option<&MetricSeries> {
        let mut labels: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        labels.sort();
        self.series.get(&SeriesKey {
            metric_name: metric_name.to_string(),
            labels,
        })
    }

    /// All series of one metric.
    pub fn series_named<'a>(
        &'a self,
        metric_name: &'a str,
    ) -> impl Iterator<Item = (&'a SeriesKey, &'a MetricSeries)> + 'a {
        self.series
            .iter()
            .filter(move |(key, _)| key.metric_name == metric_name)
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.series, &other.series) || self.series == other.series
    }
}

/// Latest-value store shared by the poll loop and the HTTP handlers.
#[derive(Debug, Default)]
pub struct SensorRegistry {
    current: RwLock<Arc<Generation>>,
    /// Serializes writers so concurrent batches cannot lose updates.
    write_lock: Mutex<()>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites a single series.
    pub fn upsert(&self, descriptor: MetricDescriptor, value: f64, timestamp: DateTime<Utc>) {
        self.apply_batch(std::iter::once((descriptor, value, timestamp)));
    }

    /// Publishes all samples of one poll cycle as a single generation.
    ///
    /// Returns the number of series in the registry afterwards.
    pub fn apply_batch<I>(&self, samples: I) -> usize
    where
        I: IntoIterator<Item = Sample>,
    {
        let _writer = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut next: Generation = (*self.load()).clone();
        let mut applied = 0usize;
        for (descriptor, value, timestamp) in samples {
            let key = SeriesKey::from(&descriptor);
            next.insert(
                key,
                MetricSeries {
                    help: descriptor.help,
                    unit: descriptor.unit,
                    value,
                    timestamp,
                },
            );
            applied += 1;
        }

        let total = next.len();
        self.store(next);
        debug!("Registry updated: {} samples applied, {} series", applied, total);
        total
    }

    /// Removes series last observed before `cutoff`. Returns how many were removed.
    pub fn evict_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let _writer = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.load();
        if !current.values().any(|s| s.timestamp < cutoff) {
            return 0;
        }

        let mut next: Generation = (*current).clone();
        let before = next.len();
        next.retain(|_, series| series.timestamp >= cutoff);
        let evicted = before - next.len();
        self.store(next);

        debug!("Evicted {} stale series", evicted);
        evicted
    }

    /// Consistent point-in-time view for exposition.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            series: self.load(),
        }
    }

    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.load().is_empty()
    }

    fn load(&self) -> Arc<Generation> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*current)
    }

    fn store(&self, next: Generation) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }
}
