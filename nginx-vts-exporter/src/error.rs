//! Error types for the exporter.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::ConfigError;

/// Failure to obtain a usable snapshot from one target.
///
/// Never fatal: the collector logs it and the target contributes no samples
/// to that pull.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Connection refused, DNS failure, timeout, or a broken body stream.
    #[error("nginx at {uri} is unreachable: {source}")]
    UpstreamUnreachable {
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    /// nginx answered with a non-2xx status.
    #[error("nginx at {uri} returned HTTP {status}")]
    UpstreamHttpError { uri: String, status: u16 },

    /// The body is not a valid VTS status document.
    #[error("malformed status document from {uri}: {source}")]
    MalformedStatusDocument {
        uri: String,
        #[source]
        source: nginx_vts_common::Error,
    },

    /// The scrape task for the target ended without producing a result.
    #[error("scrape of {uri} did not complete")]
    TaskFailed { uri: String },
}

impl ScrapeError {
    /// Short, stable name used as the `kind` label of the error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::UpstreamUnreachable { .. } => "unreachable",
            ScrapeError::UpstreamHttpError { .. } => "http",
            ScrapeError::MalformedStatusDocument { .. } => "malformed",
            ScrapeError::TaskFailed { .. } => "internal",
        }
    }
}

/// Startup errors. These are the only errors that stop the process.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("Failed to bind to {addr}: {source}")]
    ListenerBindFailure {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Server(#[source] std::io::Error),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
