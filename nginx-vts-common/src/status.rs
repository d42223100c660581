//! Typed shape of the nginx VTS status document (`/status/format/json`).
//!
//! Every field defaults to zero or empty when absent, so documents produced by
//! older or newer module versions decode without error.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One decoded status document, as returned by a single nginx instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusSnapshot {
    /// Host name reported by nginx itself.
    pub host_name: String,

    /// Version string of the running nginx binary.
    pub nginx_version: String,

    /// Unix epoch milliseconds when the configuration was (re)loaded.
    pub load_msec: i64,

    /// Unix epoch milliseconds when the document was generated.
    pub now_msec: i64,

    pub connections: Connections,

    /// Server zone name (usually a virtual host) to its statistics.
    pub server_zones: HashMap<String, ZoneStats>,

    /// Upstream group name to its member servers.
    pub upstream_zones: HashMap<String, Vec<MemberStats>>,

    /// Filter name to sub-name to statistics. Only present when
    /// `vhost_traffic_status_filter_by_set_key` is configured.
    pub filter_zones: Option<HashMap<String, HashMap<String, MemberStats>>>,

    /// Cache zone name to its statistics.
    pub cache_zones: HashMap<String, CacheStats>,
}

impl StatusSnapshot {
    /// Seconds since nginx last loaded its configuration.
    pub fn uptime_seconds(&self) -> i64 {
        self.now_msec.saturating_sub(self.load_msec) / 1000
    }
}

/// Connection counters from the `connections` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Connections {
    pub active: u64,
    pub reading: u64,
    pub writing: u64,
    pub waiting: u64,
    pub accepted: u64,
    pub handled: u64,
    pub requests: u64,
}

/// Response counts split by HTTP status class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseClasses {
    #[serde(rename = "1xx")]
    pub one_xx: u64,
    #[serde(rename = "2xx")]
    pub two_xx: u64,
    #[serde(rename = "3xx")]
    pub three_xx: u64,
    #[serde(rename = "4xx")]
    pub four_xx: u64,
    #[serde(rename = "5xx")]
    pub five_xx: u64,
}

/// Cache lookup outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOutcomes {
    pub miss: u64,
    pub bypass: u64,
    pub expired: u64,
    pub stale: u64,
    pub updating: u64,
    pub revalidated: u64,
    pub hit: u64,
    pub scarce: u64,
}

/// The `responses` object of a server zone, which carries both status
/// classes and cache outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneResponses {
    #[serde(flatten)]
    pub classes: ResponseClasses,
    #[serde(flatten)]
    pub cache: CacheOutcomes,
}

/// Statistics of one server zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ZoneStats {
    pub request_counter: u64,
    pub in_bytes: u64,
    pub out_bytes: u64,
    /// Average request processing time. Older module versions omit it.
    pub request_msec: Option<u64>,
    pub responses: ZoneResponses,
    pub over_counts: Option<OverCounts>,
}

/// Statistics of one upstream member, also used for filter zone entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberStats {
    /// Backend address, e.g. `10.0.0.1:8080`.
    pub server: String,
    pub request_counter: u64,
    pub in_bytes: u64,
    pub out_bytes: u64,
    pub responses: ResponseClasses,
    pub response_msec: u64,
    pub request_msec: u64,
    pub weight: u64,
    pub max_fails: u64,
    pub fail_timeout: u64,
    pub backup: bool,
    pub down: bool,
    pub over_counts: Option<OverCounts>,
}

/// Statistics of one cache zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheStats {
    pub max_size: u64,
    pub used_size: u64,
    pub in_bytes: u64,
    pub out_bytes: u64,
    pub responses: CacheOutcomes,
    pub over_counts: Option<OverCounts>,
}

/// Wraparound counts reported by the module for a record.
///
/// Each count says how many times the matching counter overflowed
/// `max_integer_size`. Only the fields present in the document are `Some`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverCounts {
    pub max_integer_size: f64,
    pub request_counter: Option<u64>,
    pub in_bytes: Option<u64>,
    pub out_bytes: Option<u64>,
    #[serde(rename = "1xx")]
    pub one_xx: Option<u64>,
    #[serde(rename = "2xx")]
    pub two_xx: Option<u64>,
    #[serde(rename = "3xx")]
    pub three_xx: Option<u64>,
    #[serde(rename = "4xx")]
    pub four_xx: Option<u64>,
    #[serde(rename = "5xx")]
    pub five_xx: Option<u64>,
    pub miss: Option<u64>,
    pub bypass: Option<u64>,
    pub expired: Option<u64>,
    pub stale: Option<u64>,
    pub updating: Option<u64>,
    pub revalidated: Option<u64>,
    pub hit: Option<u64>,
    pub scarce: Option<u64>,
}

impl OverCounts {
    /// The overflow counts present in the document, keyed by the JSON
    /// field name of the counter they belong to.
    pub fn counts(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        [
            ("requestCounter", self.request_counter),
            ("inBytes", self.in_bytes),
            ("outBytes", self.out_bytes),
            ("1xx", self.one_xx),
            ("2xx", self.two_xx),
            ("3xx", self.three_xx),
            ("4xx", self.four_xx),
            ("5xx", self.five_xx),
            ("miss", self.miss),
            ("bypass", self.bypass),
            ("expired", self.expired),
            ("stale", self.stale),
            ("updating", self.updating),
            ("revalidated", self.revalidated),
            ("hit", self.hit),
            ("scarce", self.scarce),
        ]
        .into_iter()
        .filter_map(|(name, count)| count.map(|c| (name, c)))
    }
}
