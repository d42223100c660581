//! Prometheus exporter for the nginx VTS module.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use nginx_vts_common::init_tracing;
use nginx_vts_exporter::{DEFAULT_SCRAPE_URI, ExporterConfig, HttpServer, VtsCollector};

/// Prometheus exporter for the nginx virtual host traffic status module.
#[derive(Parser, Debug)]
#[command(name = "nginx-vts-exporter")]
#[command(about = "Export nginx VTS status as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Path under which to expose metrics (overrides config).
    #[arg(long)]
    metrics_path: Option<String>,

    /// Prometheus metrics namespace (overrides config).
    #[arg(long)]
    namespace: Option<String>,

    /// URI of an nginx VTS JSON status page, merged into the configured targets.
    #[arg(long, default_value = DEFAULT_SCRAPE_URI)]
    scrape_uri: String,

    /// Scrape timeout in seconds (overrides config).
    #[arg(long)]
    scrape_timeout: Option<u64>,

    /// Skip TLS certificate verification for https targets.
    #[arg(long)]
    insecure: bool,

    /// Log level (trace, debug, info, warn, error). Overrides config.
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ExporterConfig> {
        let mut config = if let Some(config_path) = &self.config {
            ExporterConfig::load_from_file(config_path)?
        } else {
            ExporterConfig::default()
        };

        if let Some(listen) = self.listen {
            config.prometheus.listen = listen;
        }
        if let Some(path) = self.metrics_path {
            config.prometheus.path = path;
        }
        if let Some(namespace) = self.namespace {
            config.prometheus.namespace = namespace;
        }
        if let Some(timeout) = self.scrape_timeout {
            config.nginx.scrape_timeout_secs = timeout;
        }
        if self.insecure {
            config.nginx.insecure = true;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        config.nginx.merge_cli_target(&self.scrape_uri);

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config()?;

    init_tracing(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        targets = config.nginx.targets.len(),
        "Starting nginx VTS exporter"
    );
    for target in &config.nginx.targets {
        info!(uri = %target.uri, host = ?target.host, "Scrape target");
    }

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let collector = Arc::new(VtsCollector::new(&config)?);

    let listen_addr: SocketAddr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let http_server =
        HttpServer::bind(collector.clone(), listen_addr, config.prometheus.path.clone()).await?;

    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(shutdown_rx).await {
            error!("HTTP server error: {}", e);
        }
    });

    wait_for_signal().await;

    // The server task may already be gone; nothing to signal then.
    let _ = shutdown_tx.send(true);

    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    info!(
        series_count = collector.series_count(),
        "Exporter stopped"
    );
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down...");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down...");
                    }
                }
                return;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C, shutting down...");
    }
}
