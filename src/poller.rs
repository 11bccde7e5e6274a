//! Background poll loop.
//!
//! A single task fetches the sensor tree on a fixed interval, classifies
//! every reading and publishes the cycle as one registry batch. A failed
//! fetch leaves the registry untouched, so scrapes keep returning the last
//! known values while the hardware monitor is down.

use chrono::Utc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::error::SourceError;
use crate::registry::Sample;
use crate::source::{SensorReading, SensorSource};
use crate::state::{PollPhase, SharedState};

/// Drives one sensor source into the shared registry.
pub struct Poller<S> {
    source: S,
    state: SharedState,
}

impl<S: SensorSource> Poller<S> {
    pub fn new(source: S, state: SharedState) -> Self {
        Self { source, state }
    }

    /// Runs one fetch, classify, update cycle.
    ///
    /// Returns the number of readings applied. Errors are already logged and
    /// recorded when they are returned.
    #[instrument(skip(self), fields(source = %self.source.location()))]
    pub async fn poll_once(&self) -> Result<usize, SourceError> {
        let started = Instant::now();
        self.state.update_poll_status(|s| {
            s.phase = PollPhase::Fetching;
            s.last_attempt = Some(Utc::now());
        });

        let result = self
            .source
            .fetch()
            .await
            .map(|readings| self.apply(&readings));
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(count) => self.record_success(*count, elapsed),
            Err(e) => self.record_failure(e, elapsed),
        }

        self.evict_stale();
        self.state.update_poll_status(|s| s.phase = PollPhase::Idle);
        result
    }

    /// Polls until `shutdown` flips to true or its sender goes away.
    ///
    /// The first cycle starts immediately. Cycles never overlap; ticks missed
    /// while a cycle overruns are skipped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = self.state.config.poll_interval();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Polling {} every {}s",
            self.source.location(),
            period.as_secs()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = self.poll_once() => {}
                        _ = shutdown.changed() => {
                            debug!("Shutdown during poll cycle, abandoning it");
                            break;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.state.update_poll_status(|s| s.phase = PollPhase::Idle);
        info!("Poll loop stopped");
    }

    fn apply(&self, readings: &[SensorReading]) -> usize {
        self.state
            .update_poll_status(|s| s.phase = PollPhase::Classifying);

        let observed_at = Utc::now();
        let batch: Vec<Sample> = readings
            .iter()
            .map(|r| (self.state.classifier.describe(r), r.value, observed_at))
            .collect();

        self.state.update_poll_status(|s| s.phase = PollPhase::Updating);
        self.state.registry.apply_batch(batch);
        readings.len()
    }

    fn record_success(&self, readings: usize, elapsed: f64) {
        let series = self.state.registry.len();
        let now = Utc::now();

        let previous_failures = self.state.poll_status().consecutive_failures;
        self.state.update_poll_status(|s| {
            s.cycles += 1;
            s.consecutive_failures = 0;
            s.last_success = Some(now);
            s.last_duration_seconds = elapsed;
            s.last_error = None;
            s.last_reading_count = readings;
        });

        let telemetry = &self.state.telemetry;
        telemetry.record_poll(true, elapsed);
        telemetry
            .last_success_timestamp_seconds
            .set(now.timestamp_millis() as f64 / 1000.0);
        telemetry.readings.set(readings as f64);
        telemetry.series.set(series as f64);
        telemetry
            .unknown_sensor_types
            .set(self.state.classifier.warned_count() as f64);

        self.state
            .health_stats
            .record_poll_success(elapsed, readings, series);

        if previous_failures > 0 {
            info!(
                "Hardware monitor reachable again after {} failed poll(s)",
                previous_failures
            );
        }
        debug!(
            "Poll cycle complete: {} readings, {} series, {:.3}s",
            readings, series, elapsed
        );
    }

    fn record_failure(&self, error: &SourceError, elapsed: f64) {
        self.state.update_poll_status(|s| {
            s.cycles += 1;
            s.failures += 1;
            s.consecutive_failures += 1;
            s.last_duration_seconds = elapsed;
            s.last_error = Some(error.to_string());
        });
        self.state.telemetry.record_poll(false, elapsed);
        self.state.health_stats.record_poll_failure(elapsed);

        warn!("Hardware monitor unavailable: {}", error);
    }

    fn evict_stale(&self) {
        let Some(ttl) = self.state.config.series_ttl() else {
            return;
        };
        let Some(cutoff) = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        else {
            return;
        };

        let evicted = self.state.registry.evict_older_than(cutoff);
        if evicted > 0 {
            self.state.health_stats.record_evicted(evicted);
            self.state
                .telemetry
                .series
                .set(self.state.registry.len() as f64);
            debug!("Evicted {} series not refreshed within {:?}", evicted, ttl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::AppState;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Returns scripted results in order, then fails.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Vec<SensorReading>, SourceError>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Vec<SensorReading>, SourceError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
            }
        }
    }

    impl SensorSource for ScriptedSource {
        async fn fetch(&self) -> Result<Vec<SensorReading>, SourceError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(timeout()))
        }

        fn location(&self) -> String {
            "scripted".to_string()
        }
    }

    fn timeout() -> SourceError {
        SourceError::Timeout {
            url: "http://localhost:8086/data.json".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    fn reading(name: &str, value: f64) -> SensorReading {
        SensorReading {
            hardware_path: vec!["CPU".to_string()],
            sensor_name: name.to_string(),
            sensor_type: "Temperature".to_string(),
            value,
            hardware_id: None,
        }
    }

    #[tokio::test]
    async fn test_success_populates_registry() {
        let state = AppState::shared(Config::default()).unwrap();
        let poller = Poller::new(
            ScriptedSource::new(vec![Ok(vec![reading("Core #1", 45.2), reading("Core #2", 47.0)])]),
            state.clone(),
        );

        assert_eq!(poller.poll_once().await.unwrap(), 2);

        let snapshot = state.registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        let status = state.poll_status();
        assert!(status.is_healthy());
        assert_eq!(status.phase, PollPhase::Idle);
        assert_eq!(status.last_reading_count, 2);
        assert_eq!(state.telemetry.readings.get(), 2.0);
    }

    #[tokio::test]
    async fn test_failures_keep_last_known_values() {
        let state = AppState::shared(Config::default()).unwrap();
        let poller = Poller::new(
            ScriptedSource::new(vec![Ok(vec![reading("Core #1", 45.2)])]),
            state.clone(),
        );

        poller.poll_once().await.unwrap();
        let before = state.registry.snapshot();

        for _ in 0..3 {
            assert!(matches!(
                poller.poll_once().await,
                Err(SourceError::Timeout { .. })
            ));
        }

        assert_eq!(before, state.registry.snapshot());
        let status = state.poll_status();
        assert_eq!(status.failures, 3);
        assert_eq!(status.consecutive_failures, 3);
        assert!(!status.is_healthy());
        assert!(status.last_error.unwrap().contains("timed out"));
        assert_eq!(state.telemetry.poll_failures_total.get(), 3);
    }

    #[tokio::test]
    async fn test_recovery_resets_consecutive_failures() {
        let state = AppState::shared(Config::default()).unwrap();
        let poller = Poller::new(
            ScriptedSource::new(vec![Err(timeout()), Ok(vec![reading("Core #1", 40.0)])]),
            state.clone(),
        );

        assert!(poller.poll_once().await.is_err());
        assert!(poller.poll_once().await.is_ok());

        let status = state.poll_status();
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.failures, 1);
        assert_eq!(status.cycles, 2);
    }

    #[tokio::test]
    async fn test_ttl_evicts_sensors_that_disappear() {
        let config = Config {
            series_ttl_secs: Some(60),
            ..Config::default()
        };
        let state = AppState::shared(config).unwrap();

        // A sensor last seen long ago is dropped after the next cycle.
        let stale = state
            .classifier
            .describe(&reading("Unplugged", 30.0));
        state
            .registry
            .upsert(stale, 30.0, Utc::now() - chrono::Duration::seconds(600));

        let poller = Poller::new(
            ScriptedSource::new(vec![Ok(vec![reading("Core #1", 40.0)])]),
            state.clone(),
        );
        poller.poll_once().await.unwrap();

        let snapshot = state.registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot
            .get(
                "ohm_temperature_celsius",
                &[
                    ("sensor", "Core #1"),
                    ("hardware", "CPU"),
                    ("hardware_type", "Unknown")
                ]
            )
            .is_some());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let state = AppState::shared(Config::default()).unwrap();
        let poller = Poller::new(
            ScriptedSource::new(vec![Ok(vec![reading("Core #1", 40.0)])]),
            state.clone(),
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(poller.run(rx));

        // The first tick fires immediately.
        for _ in 0..50 {
            if state.poll_status().cycles > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(state.registry.len(), 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poll loop did not stop")
            .unwrap();
    }
}
