//! OpenHardwareMonitor Prometheus exporter.
//!
//! Polls the hardware monitor's `data.json` sensor tree on a fixed interval,
//! classifies every sensor into a canonical metric name and unit, and serves
//! the latest values in Prometheus text format.
//!
//! # Usage
//!
//! ```rust,no_run
//! use ohm_exporter::config::Config;
//! use ohm_exporter::handlers::build_router;
//! use ohm_exporter::poller::Poller;
//! use ohm_exporter::source::ConfiguredSource;
//! use ohm_exporter::state::AppState;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::default();
//! let source = ConfiguredSource::from_config(&config)?;
//! let state = AppState::shared(config)?;
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! tokio::spawn(Poller::new(source, state.clone()).run(shutdown_rx));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:9877").await?;
//! axum::serve(listener, build_router(state)).await?;
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exposition;
pub mod handlers;
pub mod health_stats;
pub mod poller;
pub mod registry;
pub mod source;
pub mod startup_checks;
pub mod state;
pub mod telemetry;

pub use classifier::{SensorClassifier, SensorKind};
pub use config::Config;
pub use error::{ExporterError, SourceError};
pub use registry::{SensorRegistry, Snapshot};
pub use source::{SensorReading, SensorSource};
