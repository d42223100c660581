//! Prometheus exporter for the nginx virtual host traffic status module.
//!
//! On every pull of the metrics endpoint the exporter fetches the VTS JSON
//! status page of each configured nginx, maps the documents to metric
//! families and renders them in the Prometheus text format.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  nginx VTS JSON │<────│    Collector    │<────│   HTTP Server   │
//! │ (status/format) │     │ (fetch and map) │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! nginx-vts-exporter --scrape-uri http://localhost/status/format/json
//! nginx-vts-exporter --config exporter.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod error;
pub mod fetch;
pub mod http;
pub mod mapping;
pub mod stats;

pub use collector::{SharedCollector, VtsCollector};
pub use config::{DEFAULT_SCRAPE_URI, ExporterConfig, TargetConfig};
pub use error::{ExporterError, ScrapeError};
pub use http::HttpServer;
