//! Configuration for the VTS exporter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use nginx_vts_common::{LoggingConfig, load_config, parse_config};

/// Scrape URI used when neither the command line nor the file names one.
pub const DEFAULT_SCRAPE_URI: &str = "http://localhost/status/format/json";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] nginx_vts_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// nginx scrape settings.
    #[serde(default)]
    pub nginx: NginxConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:9913").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Metric namespace (default: "nginx").
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_listen() -> String {
    "0.0.0.0:9913".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_namespace() -> String {
    "nginx".to_string()
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            namespace: default_namespace(),
        }
    }
}

/// Scrape target settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NginxConfig {
    /// VTS status endpoints to scrape on every pull.
    #[serde(default)]
    pub targets: Vec<TargetConfig>,

    /// Per-request timeout in seconds (default: 2).
    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout_secs: u64,

    /// Skip TLS certificate verification for https targets.
    #[serde(default)]
    pub insecure: bool,
}

fn default_scrape_timeout() -> u64 {
    2
}

impl Default for NginxConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            scrape_timeout_secs: default_scrape_timeout(),
            insecure: false,
        }
    }
}

impl NginxConfig {
    /// Scrape timeout as a [`Duration`].
    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }

    /// Merge the single target given on the command line into the list.
    ///
    /// The command-line target is skipped when the list already contains it,
    /// or when the file supplied targets and `uri` is still the default.
    pub fn merge_cli_target(&mut self, uri: &str) {
        if self.targets.iter().any(|t| t.uri == uri) {
            return;
        }
        if !self.targets.is_empty() && uri == DEFAULT_SCRAPE_URI {
            return;
        }
        self.targets.push(TargetConfig::new(uri));
    }
}

/// A single nginx instance to scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// URI of the VTS JSON status page.
    pub uri: String,

    /// Value for the `hostName` label. Falls back to the host name nginx
    /// reports in the document.
    #[serde(default)]
    pub host: Option<String>,
}

impl TargetConfig {
    /// Create a target without a host override.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            host: None,
        }
    }

    /// Set the host label override.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: ExporterConfig = load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate listen address format
        if self
            .prometheus
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            )));
        }

        // Validate path starts with /
        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        // "/" is the landing page
        if self.prometheus.path == "/" {
            return Err(ConfigError::Validation(
                "Metrics path must not be /".to_string(),
            ));
        }

        if self.nginx.scrape_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "scrape_timeout_secs must be > 0".to_string(),
            ));
        }

        for target in &self.nginx.targets {
            let url = reqwest::Url::parse(&target.uri).map_err(|e| {
                ConfigError::Validation(format!("Invalid scrape URI '{}': {}", target.uri, e))
            })?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::Validation(format!(
                    "Scrape URI '{}' must use http or https",
                    target.uri
                )));
            }
        }

        Ok(())
    }
}
