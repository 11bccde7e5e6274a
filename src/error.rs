//! Error types for the exporter.
//!
//! `SourceError` covers everything that can go wrong while polling the
//! hardware monitor; it is always contained by the poll loop. `ExporterError`
//! covers startup failures that terminate the process.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The upstream sensor source could not deliver a usable sensor tree.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("malformed sensor tree: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal startup errors.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("cannot bind exposition endpoint to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load TLS configuration: {0}")]
    Tls(#[source] std::io::Error),

    #[error("{0}")]
    Config(String),

    #[error("failed to initialize exporter metrics: {0}")]
    Telemetry(#[from] prometheus::Error),
}
