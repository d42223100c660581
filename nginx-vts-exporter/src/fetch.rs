//! Retrieval of VTS status documents over HTTP.

use tracing::trace;

use nginx_vts_common::{StatusSnapshot, decode_status};

use crate::config::NginxConfig;
use crate::error::{ExporterError, ScrapeError};

/// HTTP client for VTS status pages.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Build a fetcher with the configured timeout and TLS policy.
    pub fn new(config: &NginxConfig) -> Result<Self, ExporterError> {
        let client = reqwest::Client::builder()
            .timeout(config.scrape_timeout())
            .danger_accept_invalid_certs(config.insecure)
            .user_agent(concat!("nginx-vts-exporter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ExporterError::Client)?;

        Ok(Self { client })
    }

    /// GET `uri` and return the full body of a 2xx response.
    pub async fn fetch(&self, uri: &str) -> Result<Vec<u8>, ScrapeError> {
        let unreachable = |source: reqwest::Error| ScrapeError::UpstreamUnreachable {
            uri: uri.to_string(),
            source,
        };

        let response = self.client.get(uri).send().await.map_err(unreachable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::UpstreamHttpError {
                uri: uri.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(unreachable)?;
        trace!(uri, bytes = body.len(), "Fetched status document");

        Ok(body.into())
    }

    /// Fetch and decode the status document at `uri`.
    pub async fn scrape(&self, uri: &str) -> Result<StatusSnapshot, ScrapeError> {
        let body = self.fetch(uri).await?;

        decode_status(&body).map_err(|source| ScrapeError::MalformedStatusDocument {
            uri: uri.to_string(),
            source,
        })
    }
}
