//! Metric collector that scrapes nginx on demand and renders the results.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, trace, warn};

use nginx_vts_common::StatusSnapshot;

use crate::config::{ExporterConfig, TargetConfig};
use crate::error::{ExporterError, ScrapeError};
use crate::fetch::Fetcher;
use crate::mapping::{Family, PrometheusType, Sample, map_snapshot, resolve_host};
use crate::stats::ExporterStats;

/// A unique identifier for a metric time series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub family: Family,
    /// Label pairs in declaration order.
    pub labels: Vec<(&'static str, String)>,
}

impl SeriesKey {
    /// Format labels for Prometheus exposition format.
    pub fn format_labels(&self) -> String {
        if self.labels.is_empty() {
            return String::new();
        }

        let parts: Vec<String> = self
            .labels
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
            .collect();

        format!("{{{}}}", parts.join(","))
    }
}

/// Name, help text, type and label keys of one family.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDescriptor {
    pub name: String,
    pub help: &'static str,
    pub metric_type: PrometheusType,
    pub label_keys: &'static [&'static str],
}

/// The samples of the most recent pull.
///
/// Every pull resets the store and repopulates it from fresh snapshots, so a
/// series absent from the latest status documents is not exposed.
#[derive(Debug, Default)]
pub struct SampleStore {
    series: HashMap<SeriesKey, f64>,
}

impl SampleStore {
    pub fn reset(&mut self) {
        self.series.clear();
    }

    /// Insert a sample. Returns `true` when it replaced a series already
    /// written in this pull.
    pub fn insert(&mut self, sample: Sample) -> bool {
        let key = SeriesKey {
            family: sample.family,
            labels: sample.labels,
        };
        self.series.insert(key, sample.value).is_some()
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Render in Prometheus exposition format.
    pub fn render(&self, namespace: &str) -> String {
        let mut output = Vec::with_capacity(self.series.len() * 100);

        // Group series by family for HELP/TYPE comments
        let mut by_name: BTreeMap<String, (Family, Vec<(&SeriesKey, f64)>)> = BTreeMap::new();
        for (key, value) in &self.series {
            by_name
                .entry(key.family.metric_name(namespace))
                .or_insert_with(|| (key.family, Vec::new()))
                .1
                .push((key, *value));
        }

        for (name, (family, mut series)) in by_name {
            series.sort_by(|a, b| a.0.labels.cmp(&b.0.labels));

            writeln!(output, "# HELP {} {}", name, family.help()).ok();
            writeln!(output, "# TYPE {} {}", name, family.metric_type().as_str()).ok();

            for (key, value) in series {
                writeln!(
                    output,
                    "{}{} {}",
                    name,
                    key.format_labels(),
                    format_value(value)
                )
                .ok();
            }
        }

        String::from_utf8(output).unwrap_or_default()
    }
}

/// Scrapes every configured target on each pull.
pub struct VtsCollector {
    fetcher: Fetcher,
    targets: Vec<TargetConfig>,
    namespace: String,
    store: Mutex<SampleStore>,
    stats: ExporterStats,
}

/// Create a shareable collector handle.
pub type SharedCollector = Arc<VtsCollector>;

impl VtsCollector {
    /// Create a collector for the targets and namespace in `config`.
    pub fn new(config: &ExporterConfig) -> Result<Self, ExporterError> {
        Ok(Self {
            fetcher: Fetcher::new(&config.nginx)?,
            targets: config.nginx.targets.clone(),
            namespace: config.prometheus.namespace.clone(),
            store: Mutex::new(SampleStore::default()),
            stats: ExporterStats::new(&config.prometheus.namespace),
        })
    }

    /// Descriptors of every family this collector can emit.
    pub fn describe(&self) -> Vec<MetricDescriptor> {
        Family::ALL
            .iter()
            .map(|family| MetricDescriptor {
                name: family.metric_name(&self.namespace),
                help: family.help(),
                metric_type: family.metric_type(),
                label_keys: family.label_keys(),
            })
            .collect()
    }

    /// Number of series exposed by the most recent pull.
    pub fn series_count(&self) -> usize {
        self.store.lock().series_count()
    }

    /// Scrape all targets and render the exposition body.
    ///
    /// A target that fails contributes no samples; the others are unaffected.
    pub async fn collect(&self) -> String {
        let started = Instant::now();
        let results = self.scrape_all().await;

        let mut body = {
            let mut store = self.store.lock();
            store.reset();

            let mut hosts = HashSet::new();
            for (target, result) in results {
                self.stats.record_scrape(&target.uri);
                match result {
                    Ok(snapshot) => {
                        let host = host_label(&target, &snapshot, &hosts, self.targets.len());
                        let samples = map_snapshot(&snapshot, &host);
                        trace!(uri = %target.uri, host = %host, samples = samples.len(), "Mapped snapshot");

                        let mut replaced = 0usize;
                        for sample in samples {
                            if store.insert(sample) {
                                replaced += 1;
                            }
                        }
                        if replaced > 0 {
                            warn!(
                                uri = %target.uri,
                                host = %host,
                                replaced,
                                "Series collide with another target; set a distinct host for it"
                            );
                        }
                        hosts.insert(host);
                    }
                    Err(err) => {
                        self.stats.record_error(&target.uri, err.kind());
                        if matches!(
                            err,
                            ScrapeError::MalformedStatusDocument { .. }
                                | ScrapeError::TaskFailed { .. }
                        ) {
                            error!(uri = %target.uri, error = %err, "Scrape failed");
                        } else {
                            warn!(uri = %target.uri, error = %err, "Scrape failed");
                        }
                    }
                }
            }

            debug!(series = store.series_count(), "Collection complete");
            store.render(&self.namespace)
        };

        self.stats.observe_duration(started.elapsed());
        self.stats.encode_into(&mut body);
        body
    }

    /// Fetch every target concurrently. Results come back in target order.
    async fn scrape_all(&self) -> Vec<(TargetConfig, Result<StatusSnapshot, ScrapeError>)> {
        let mut tasks = JoinSet::new();
        for (index, target) in self.targets.iter().enumerate() {
            let fetcher = self.fetcher.clone();
            let uri = target.uri.clone();
            tasks.spawn(async move { (index, fetcher.scrape(&uri).await) });
        }

        let mut finished = Vec::with_capacity(self.targets.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => finished.push(result),
                Err(e) => error!(error = %e, "Scrape task failed"),
            }
        }

        complete_results(&self.targets, finished)
    }
}

/// Pair every target with its result, in target order. A target whose task
/// produced nothing gets [`ScrapeError::TaskFailed`].
fn complete_results(
    targets: &[TargetConfig],
    finished: Vec<(usize, Result<StatusSnapshot, ScrapeError>)>,
) -> Vec<(TargetConfig, Result<StatusSnapshot, ScrapeError>)> {
    let mut slots: Vec<Option<Result<StatusSnapshot, ScrapeError>>> =
        targets.iter().map(|_| None).collect();
    for (index, result) in finished {
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(result);
        }
    }

    targets
        .iter()
        .zip(slots)
        .map(|(target, slot)| {
            let result = slot.unwrap_or_else(|| {
                Err(ScrapeError::TaskFailed {
                    uri: target.uri.clone(),
                })
            });
            (target.clone(), result)
        })
        .collect()
}

/// Value of the `hostName` label for one target in a pass.
///
/// A configured override is used as is. Otherwise the host nginx reports is
/// used, unless several targets are configured and it is empty or already
/// taken by an earlier target in the pass; then the target's URI authority
/// stands in for it.
fn host_label(
    target: &TargetConfig,
    snapshot: &StatusSnapshot,
    taken: &HashSet<String>,
    target_count: usize,
) -> String {
    let resolved = resolve_host(target.host.as_deref(), snapshot);
    if target.host.is_some() || target_count < 2 {
        return resolved.to_string();
    }
    if !resolved.is_empty() && !taken.contains(resolved) {
        return resolved.to_string();
    }
    uri_authority(&target.uri).unwrap_or_else(|| target.uri.clone())
}

/// `host[:port]` of a URI.
fn uri_authority(uri: &str) -> Option<String> {
    let url = reqwest::Url::parse(uri).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
