//! The exporter's own metrics, appended after the nginx samples.

use std::fmt::Write;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct BuildLabels {
    version: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct TargetLabels {
    target: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ErrorLabels {
    target: String,
    kind: String,
}

/// Scrape statistics registered under `<namespace>_exporter`.
pub struct ExporterStats {
    registry: Registry,
    scrapes: Family<TargetLabels, Counter>,
    scrape_errors: Family<ErrorLabels, Counter>,
    scrape_duration: Gauge<f64, AtomicU64>,
}

impl ExporterStats {
    pub fn new(namespace: &str) -> Self {
        let prefix = if namespace.is_empty() {
            "exporter".to_string()
        } else {
            format!("{}_exporter", namespace)
        };
        let mut registry = Registry::with_prefix(prefix);

        let build = Family::<BuildLabels, Gauge>::default();
        build
            .get_or_create(&BuildLabels {
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
            .set(1);
        registry.register("build_info", "Exporter build information", build);

        let scrapes = Family::<TargetLabels, Counter>::default();
        registry.register("scrapes", "Scrapes attempted per target", scrapes.clone());

        let scrape_errors = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "scrape_errors",
            "Failed scrapes per target and failure kind",
            scrape_errors.clone(),
        );

        let scrape_duration = Gauge::<f64, AtomicU64>::default();
        registry.register(
            "scrape_duration_seconds",
            "Duration of the last collection across all targets",
            scrape_duration.clone(),
        );

        Self {
            registry,
            scrapes,
            scrape_errors,
            scrape_duration,
        }
    }

    pub fn record_scrape(&self, target: &str) {
        self.scrapes
            .get_or_create(&TargetLabels {
                target: target.to_string(),
            })
            .inc();
    }

    pub fn record_error(&self, target: &str, kind: &str) {
        self.scrape_errors
            .get_or_create(&ErrorLabels {
                target: target.to_string(),
                kind: kind.to_string(),
            })
            .inc();
    }

    pub fn observe_duration(&self, elapsed: Duration) {
        self.scrape_duration.set(elapsed.as_secs_f64());
    }

    /// Append the text encoding to `out`, without the OpenMetrics `# EOF`
    /// terminator.
    pub fn encode_into(&self, out: &mut String) {
        // OpenMetrics text: counters are typed under their base name and
        // sampled as `<name>_total`. The 0.0.4 text parser accepts this.
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            return;
        }
        for line in buffer.lines().filter(|l| *l != "# EOF") {
            writeln!(out, "{}", line).ok();
        }
    }
}
