//! Integration tests for the HTTP endpoints.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`; polls
//! are triggered by hand through a scripted sensor source.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use std::sync::Mutex;
use tower::ServiceExt;

use ohm_exporter::config::Config;
use ohm_exporter::error::SourceError;
use ohm_exporter::handlers::build_router;
use ohm_exporter::poller::Poller;
use ohm_exporter::source::{SensorReading, SensorSource};
use ohm_exporter::state::{AppState, SharedState};

/// Returns queued results in order, then keeps failing.
struct ScriptedSource {
    results: Mutex<Vec<Result<Vec<SensorReading>, SourceError>>>,
}

impl ScriptedSource {
    fn new(mut results: Vec<Result<Vec<SensorReading>, SourceError>>) -> Self {
        results.reverse();
        Self {
            results: Mutex::new(results),
        }
    }
}

impl SensorSource for ScriptedSource {
    async fn fetch(&self) -> Result<Vec<SensorReading>, SourceError> {
        self.results
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(unreachable_error()))
    }

    fn location(&self) -> String {
        "scripted".to_string()
    }
}

fn unreachable_error() -> SourceError {
    SourceError::Timeout {
        url: "http://localhost:8086/data.json".to_string(),
        timeout: std::time::Duration::from_secs(5),
    }
}

fn core_reading(name: &str, value: f64) -> SensorReading {
    SensorReading {
        hardware_path: vec!["CPU".to_string()],
        sensor_name: name.to_string(),
        sensor_type: "Temperature".to_string(),
        value,
        hardware_id: None,
    }
}

fn quiet_config() -> Config {
    Config {
        enable_telemetry: Some(false),
        ..Config::default()
    }
}

async fn get(state: &SharedState, uri: &str) -> (StatusCode, String, Option<String>) {
    let response = build_router(state.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap(), content_type)
}

#[tokio::test]
async fn test_metrics_before_first_poll_is_empty() {
    let state = AppState::shared(quiet_config()).unwrap();

    let (status, body, content_type) = get(&state, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "");
    assert_eq!(
        content_type.as_deref(),
        Some("text/plain; version=0.0.4; charset=utf-8")
    );
}

#[tokio::test]
async fn test_metrics_after_poll() {
    let state = AppState::shared(quiet_config()).unwrap();
    let source = ScriptedSource::new(vec![Ok(vec![
        core_reading("Core #1", 45.2),
        core_reading("Core #2", 47.0),
    ])]);
    Poller::new(source, state.clone()).poll_once().await.unwrap();

    let (status, body, _) = get(&state, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("# TYPE ohm_temperature_celsius gauge"), "{body}");
    assert!(
        body.contains(
            r#"ohm_temperature_celsius{hardware="CPU",hardware_type="Unknown",sensor="Core #1"} 45.2"#
        ),
        "{body}"
    );
    assert!(body.contains(r#"sensor="Core #2"} 47"#), "{body}");
    assert_eq!(body.matches("# HELP ohm_temperature_celsius").count(), 1);
}

#[tokio::test]
async fn test_metrics_survive_monitor_outage() {
    let state = AppState::shared(quiet_config()).unwrap();
    let source = ScriptedSource::new(vec![
        Ok(vec![core_reading("Core #1", 45.2)]),
        Err(unreachable_error()),
    ]);
    let poller = Poller::new(source, state.clone());

    poller.poll_once().await.unwrap();
    let (_, before, _) = get(&state, "/metrics").await;

    assert!(poller.poll_once().await.is_err());
    let (status, after, _) = get(&state, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_telemetry_is_appended() {
    let state = AppState::shared(Config::default()).unwrap();
    let source = ScriptedSource::new(vec![Ok(vec![core_reading("Core #1", 45.2)])]);
    Poller::new(source, state.clone()).poll_once().await.unwrap();

    let (_, body, _) = get(&state, "/metrics").await;

    assert!(body.contains("ohm_temperature_celsius{"));
    assert!(body.contains("ohm_exporter_polls_total 1"), "{body}");
    assert!(body.contains("ohm_exporter_poll_success 1"), "{body}");
}

#[tokio::test]
async fn test_custom_metrics_path() {
    let state = AppState::shared(Config {
        metrics_path: Some("/sensors".to_string()),
        ..quiet_config()
    })
    .unwrap();

    let (status, _, _) = get(&state, "/sensors").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = get(&state, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_follows_poll_outcome() {
    let state = AppState::shared(quiet_config()).unwrap();
    let source = ScriptedSource::new(vec![
        Ok(vec![core_reading("Core #1", 45.2)]),
        Err(unreachable_error()),
    ]);
    let poller = Poller::new(source, state.clone());

    let (status, body, _) = get(&state, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.starts_with("Waiting for first poll"), "{body}");

    poller.poll_once().await.unwrap();
    let (status, body, _) = get(&state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("OK"), "{body}");
    assert!(body.contains("POLL STATUS"));

    let _ = poller.poll_once().await;
    let (status, body, _) = get(&state, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("1 consecutive failures"), "{body}");
    assert!(body.contains("timed out"), "{body}");
}

#[tokio::test]
async fn test_health_can_be_disabled() {
    let state = AppState::shared(Config {
        enable_health: Some(false),
        ..quiet_config()
    })
    .unwrap();

    let (status, _, _) = get(&state, "/health").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_config_endpoint_is_yaml() {
    let state = AppState::shared(Config {
        poll_interval_secs: Some(30),
        ..quiet_config()
    })
    .unwrap();

    let (status, body, content_type) = get(&state, "/config").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("application/yaml"));
    let parsed: Config = serde_yaml::from_str(&body).unwrap();
    assert_eq!(parsed.poll_interval_secs, Some(30));
}

#[tokio::test]
async fn test_root_lists_endpoints() {
    let state = AppState::shared(quiet_config()).unwrap();

    let (status, body, _) = get(&state, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"href="/metrics""#));
    assert!(body.contains(r#"href="/health""#));
    assert!(body.contains("http://localhost:8086/data.json"));
}
