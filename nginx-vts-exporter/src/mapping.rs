//! Mapping from a VTS status snapshot to Prometheus samples.
//!
//! Each [`Family`] is one metric family with a fixed name, type and label
//! dimension set. [`map_snapshot`] walks a snapshot and produces the samples
//! for every family, aggregating upstream members into group totals.

use std::collections::BTreeMap;

use nginx_vts_common::{
    CacheOutcomes, CacheStats, MemberStats, OverCounts, ResponseClasses, StatusSnapshot, ZoneStats,
};

/// Label carrying the resolved nginx host identifier on every family.
pub const HOST_LABEL: &str = "hostName";

/// Metric subsystem, the middle component of every metric name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subsystem {
    Server,
    Upstream,
    Filter,
    Cache,
}

impl Subsystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Server => "server",
            Subsystem::Upstream => "upstream",
            Subsystem::Filter => "filter",
            Subsystem::Cache => "cache",
        }
    }
}

/// Prometheus metric type of a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrometheusType {
    Counter,
    Gauge,
}

impl PrometheusType {
    /// Get the TYPE comment string for Prometheus exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrometheusType::Counter => "counter",
            PrometheusType::Gauge => "gauge",
        }
    }
}

/// Every metric family the exporter can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Family {
    ServerInfo,
    ServerConnections,
    ServerRequests,
    ServerBytes,
    ServerCache,
    ServerRequestMsec,
    ServerOverCounts,
    UpstreamRequests,
    UpstreamBytes,
    UpstreamResponseMsec,
    UpstreamRequestMsec,
    UpstreamOverCounts,
    FilterRequests,
    FilterBytes,
    FilterResponseMsec,
    FilterRequestMsec,
    FilterOverCounts,
    CacheRequests,
    CacheBytes,
    CacheSize,
    CacheOverCounts,
}

impl Family {
    pub const ALL: [Family; 21] = [
        Family::ServerInfo,
        Family::ServerConnections,
        Family::ServerRequests,
        Family::ServerBytes,
        Family::ServerCache,
        Family::ServerRequestMsec,
        Family::ServerOverCounts,
        Family::UpstreamRequests,
        Family::UpstreamBytes,
        Family::UpstreamResponseMsec,
        Family::UpstreamRequestMsec,
        Family::UpstreamOverCounts,
        Family::FilterRequests,
        Family::FilterBytes,
        Family::FilterResponseMsec,
        Family::FilterRequestMsec,
        Family::FilterOverCounts,
        Family::CacheRequests,
        Family::CacheBytes,
        Family::CacheSize,
        Family::CacheOverCounts,
    ];

    pub fn subsystem(&self) -> Subsystem {
        use Family::*;
        match self {
            ServerInfo | ServerConnections | ServerRequests | ServerBytes | ServerCache
            | ServerRequestMsec | ServerOverCounts => Subsystem::Server,
            UpstreamRequests | UpstreamBytes | UpstreamResponseMsec | UpstreamRequestMsec
            | UpstreamOverCounts => Subsystem::Upstream,
            FilterRequests | FilterBytes | FilterResponseMsec | FilterRequestMsec
            | FilterOverCounts => Subsystem::Filter,
            CacheRequests | CacheBytes | CacheSize | CacheOverCounts => Subsystem::Cache,
        }
    }

    /// Last component of the metric name.
    pub fn name(&self) -> &'static str {
        use Family::*;
        match self {
            ServerInfo => "info",
            ServerConnections => "connections",
            ServerRequests | UpstreamRequests | FilterRequests | CacheRequests => "requests",
            ServerBytes | UpstreamBytes | FilterBytes | CacheBytes => "bytes",
            ServerCache => "cache",
            ServerRequestMsec | UpstreamRequestMsec | FilterRequestMsec => "requestMsec",
            UpstreamResponseMsec | FilterResponseMsec => "responseMsec",
            CacheSize => "size",
            ServerOverCounts | UpstreamOverCounts | FilterOverCounts | CacheOverCounts => {
                "overCounts"
            }
        }
    }

    pub fn metric_type(&self) -> PrometheusType {
        use Family::*;
        match self {
            ServerInfo | ServerConnections | ServerRequestMsec | UpstreamResponseMsec
            | UpstreamRequestMsec | FilterResponseMsec | FilterRequestMsec | CacheSize => {
                PrometheusType::Gauge
            }
            ServerRequests | ServerBytes | ServerCache | ServerOverCounts | UpstreamRequests
            | UpstreamBytes | UpstreamOverCounts | FilterRequests | FilterBytes
            | FilterOverCounts | CacheRequests | CacheBytes | CacheOverCounts => {
                PrometheusType::Counter
            }
        }
    }

    pub fn help(&self) -> &'static str {
        use Family::*;
        match self {
            ServerInfo => "nginx info, value is uptime in seconds",
            ServerConnections => "nginx connections",
            ServerRequests | UpstreamRequests | FilterRequests => "requests counter",
            ServerBytes | UpstreamBytes | FilterBytes => "request/response bytes",
            ServerCache => "cache counter",
            ServerRequestMsec | UpstreamRequestMsec | FilterRequestMsec => {
                "average of request processing times in milliseconds"
            }
            UpstreamResponseMsec | FilterResponseMsec => {
                "average of only upstream/backend response processing times in milliseconds"
            }
            CacheRequests => "cache requests counter",
            CacheBytes => "cache request/response bytes",
            CacheSize => "cache zone size in bytes",
            ServerOverCounts | UpstreamOverCounts | FilterOverCounts | CacheOverCounts => {
                "counter wraparounds multiplied by maxIntegerSize"
            }
        }
    }

    /// Label keys in exposition order. [`HOST_LABEL`] is always last and is
    /// left out of a sample when the host identifier is empty.
    pub fn label_keys(&self) -> &'static [&'static str] {
        use Family::*;
        match self {
            ServerInfo => &["nginxVersion", HOST_LABEL],
            ServerConnections => &["status", HOST_LABEL],
            ServerRequests => &["host", "code", HOST_LABEL],
            ServerBytes => &["host", "direction", HOST_LABEL],
            ServerCache => &["host", "status", HOST_LABEL],
            ServerRequestMsec => &["host", HOST_LABEL],
            ServerOverCounts => &["host", "counter", HOST_LABEL],
            UpstreamRequests => &["upstream", "code", HOST_LABEL],
            UpstreamBytes => &["upstream", "direction", HOST_LABEL],
            UpstreamResponseMsec | UpstreamRequestMsec => &["upstream", "backend", HOST_LABEL],
            UpstreamOverCounts => &["upstream", "counter", HOST_LABEL],
            FilterRequests => &["filter", "filterName", "code", HOST_LABEL],
            FilterBytes => &["filter", "filterName", "direction", HOST_LABEL],
            FilterResponseMsec | FilterRequestMsec => &["filter", "filterName", HOST_LABEL],
            FilterOverCounts => &["filter", "filterName", "counter", HOST_LABEL],
            CacheRequests => &["zone", "status", HOST_LABEL],
            CacheBytes => &["zone", "direction", HOST_LABEL],
            CacheSize => &["zone", "type", HOST_LABEL],
            CacheOverCounts => &["zone", "counter", HOST_LABEL],
        }
    }

    /// Full metric name under `namespace`.
    pub fn metric_name(&self, namespace: &str) -> String {
        build_metric_name(namespace, self.subsystem(), self.name())
    }
}

/// Build a full Prometheus metric name from components.
///
/// Format: `{namespace}_{subsystem}_{name}`
pub fn build_metric_name(namespace: &str, subsystem: Subsystem, name: &str) -> String {
    if namespace.is_empty() {
        format!("{}_{}", subsystem.as_str(), name)
    } else {
        format!("{}_{}_{}", namespace, subsystem.as_str(), name)
    }
}

/// One value of one series, produced from a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub family: Family,
    /// Label pairs in [`Family::label_keys`] order.
    pub labels: Vec<(&'static str, String)>,
    pub value: f64,
}

impl Sample {
    /// Value of label `key`, if present.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Pick the `hostName` label value for a target: the configured override,
/// or the host name nginx reports about itself.
pub fn resolve_host<'a>(override_host: Option<&'a str>, snapshot: &'a StatusSnapshot) -> &'a str {
    override_host.unwrap_or(&snapshot.host_name)
}

/// Project a snapshot into samples.
///
/// Zone, group and filter names are used as label values verbatim.
pub fn map_snapshot(snapshot: &StatusSnapshot, host: &str) -> Vec<Sample> {
    let mut mapper = SnapshotMapper {
        host,
        samples: Vec::new(),
    };

    mapper.info(snapshot);
    mapper.connections(snapshot);

    for (zone, stats) in &snapshot.server_zones {
        mapper.server_zone(zone, stats);
    }
    for (group, members) in &snapshot.upstream_zones {
        mapper.upstream_group(group, members);
    }
    if let Some(filters) = &snapshot.filter_zones {
        for (filter, entries) in filters {
            for (name, stats) in entries {
                mapper.filter_entry(filter, name, stats);
            }
        }
    }
    for (zone, stats) in &snapshot.cache_zones {
        mapper.cache_zone(zone, stats);
    }

    mapper.samples
}

struct SnapshotMapper<'a> {
    host: &'a str,
    samples: Vec<Sample>,
}

impl SnapshotMapper<'_> {
    fn push(&mut self, family: Family, labels: &[(&'static str, &str)], value: f64) {
        let mut owned = Vec::with_capacity(labels.len() + 1);
        owned.extend(labels.iter().map(|(k, v)| (*k, v.to_string())));
        if !self.host.is_empty() {
            owned.push((HOST_LABEL, self.host.to_string()));
        }

        debug_assert!(
            owned
                .iter()
                .map(|(k, _)| *k)
                .eq(family.label_keys().iter().copied().take(owned.len())),
            "labels of {:?} out of order",
            family
        );

        self.samples.push(Sample {
            family,
            labels: owned,
            value,
        });
    }

    fn info(&mut self, snapshot: &StatusSnapshot) {
        self.push(
            Family::ServerInfo,
            &[("nginxVersion", snapshot.nginx_version.as_str())],
            snapshot.uptime_seconds() as f64,
        );
    }

    fn connections(&mut self, snapshot: &StatusSnapshot) {
        let c = &snapshot.connections;
        for (status, value) in [
            ("active", c.active),
            ("reading", c.reading),
            ("writing", c.writing),
            ("waiting", c.waiting),
            ("accepted", c.accepted),
            ("handled", c.handled),
            ("requests", c.requests),
        ] {
            self.push(
                Family::ServerConnections,
                &[("status", status)],
                value as f64,
            );
        }
    }

    fn server_zone(&mut self, zone: &str, stats: &ZoneStats) {
        for (code, value) in response_codes(stats.request_counter, &stats.responses.classes) {
            self.push(
                Family::ServerRequests,
                &[("host", zone), ("code", code)],
                value as f64,
            );
        }
        for (status, value) in cache_outcomes(&stats.responses.cache) {
            self.push(
                Family::ServerCache,
                &[("host", zone), ("status", status)],
                value as f64,
            );
        }
        self.bytes(
            Family::ServerBytes,
            &[("host", zone)],
            stats.in_bytes as f64,
            stats.out_bytes as f64,
        );
        if let Some(msec) = stats.request_msec {
            self.push(Family::ServerRequestMsec, &[("host", zone)], msec as f64);
        }
        if let Some(over) = &stats.over_counts {
            self.over_counts(Family::ServerOverCounts, &[("host", zone)], over);
        }
    }

    /// Request and byte counts are summed over the members into one set of
    /// group counters; latency stays per member.
    fn upstream_group(&mut self, group: &str, members: &[MemberStats]) {
        let mut totals = GroupTotals::default();

        for member in members {
            totals.add(member);

            self.push(
                Family::UpstreamResponseMsec,
                &[("upstream", group), ("backend", member.server.as_str())],
                member.response_msec as f64,
            );
            self.push(
                Family::UpstreamRequestMsec,
                &[("upstream", group), ("backend", member.server.as_str())],
                member.request_msec as f64,
            );
        }

        for (code, value) in [
            ("total", totals.requests),
            ("1xx", totals.classes[0]),
            ("2xx", totals.classes[1]),
            ("3xx", totals.classes[2]),
            ("4xx", totals.classes[3]),
            ("5xx", totals.classes[4]),
        ] {
            self.push(
                Family::UpstreamRequests,
                &[("upstream", group), ("code", code)],
                value as f64,
            );
        }
        self.bytes(
            Family::UpstreamBytes,
            &[("upstream", group)],
            totals.in_bytes as f64,
            totals.out_bytes as f64,
        );
        for (counter, value) in &totals.overflow {
            self.push(
                Family::UpstreamOverCounts,
                &[("upstream", group), ("counter", *counter)],
                *value,
            );
        }
    }

    fn filter_entry(&mut self, filter: &str, name: &str, stats: &MemberStats) {
        let base = [("filter", filter), ("filterName", name)];

        self.push(Family::FilterResponseMsec, &base, stats.response_msec as f64);
        self.push(Family::FilterRequestMsec, &base, stats.request_msec as f64);
        for (code, value) in response_codes(stats.request_counter, &stats.responses) {
            self.push(
                Family::FilterRequests,
                &[base[0], base[1], ("code", code)],
                value as f64,
            );
        }
        self.bytes(
            Family::FilterBytes,
            &base,
            stats.in_bytes as f64,
            stats.out_bytes as f64,
        );
        if let Some(over) = &stats.over_counts {
            self.over_counts(Family::FilterOverCounts, &base, over);
        }
    }

    fn cache_zone(&mut self, zone: &str, stats: &CacheStats) {
        for (status, value) in cache_outcomes(&stats.responses) {
            self.push(
                Family::CacheRequests,
                &[("zone", zone), ("status", status)],
                value as f64,
            );
        }
        self.bytes(
            Family::CacheBytes,
            &[("zone", zone)],
            stats.in_bytes as f64,
            stats.out_bytes as f64,
        );
        self.push(
            Family::CacheSize,
            &[("zone", zone), ("type", "max")],
            stats.max_size as f64,
        );
        self.push(
            Family::CacheSize,
            &[("zone", zone), ("type", "used")],
            stats.used_size as f64,
        );
        if let Some(over) = &stats.over_counts {
            self.over_counts(Family::CacheOverCounts, &[("zone", zone)], over);
        }
    }

    fn bytes(&mut self, family: Family, base: &[(&'static str, &str)], input: f64, output: f64) {
        for (direction, value) in [("in", input), ("out", output)] {
            let mut labels = base.to_vec();
            labels.push(("direction", direction));
            self.push(family, &labels, value);
        }
    }

    fn over_counts(&mut self, family: Family, base: &[(&'static str, &str)], over: &OverCounts) {
        for (counter, count) in over.counts() {
            let mut labels = base.to_vec();
            labels.push(("counter", counter));
            self.push(family, &labels, count as f64 * over.max_integer_size);
        }
    }
}

/// Running sums over the members of one upstream group. Integer sums are
/// kept in `u128` so they stay exact until the final conversion.
#[derive(Default)]
struct GroupTotals {
    requests: u128,
    classes: [u128; 5],
    in_bytes: u128,
    out_bytes: u128,
    overflow: BTreeMap<&'static str, f64>,
}

impl GroupTotals {
    fn add(&mut self, member: &MemberStats) {
        let r = &member.responses;
        self.requests += u128::from(member.request_counter);
        for (sum, value) in self
            .classes
            .iter_mut()
            .zip([r.one_xx, r.two_xx, r.three_xx, r.four_xx, r.five_xx])
        {
            *sum += u128::from(value);
        }
        self.in_bytes += u128::from(member.in_bytes);
        self.out_bytes += u128::from(member.out_bytes);

        if let Some(over) = &member.over_counts {
            for (counter, count) in over.counts() {
                *self.overflow.entry(counter).or_default() += count as f64 * over.max_integer_size;
            }
        }
    }
}

fn response_codes(total: u64, r: &ResponseClasses) -> [(&'static str, u64); 6] {
    [
        ("total", total),
        ("1xx", r.one_xx),
        ("2xx", r.two_xx),
        ("3xx", r.three_xx),
        ("4xx", r.four_xx),
        ("5xx", r.five_xx),
    ]
}

fn cache_outcomes(c: &CacheOutcomes) -> [(&'static str, u64); 8] {
    [
        ("bypass", c.bypass),
        ("expired", c.expired),
        ("hit", c.hit),
        ("miss", c.miss),
        ("revalidated", c.revalidated),
        ("scarce", c.scarce),
        ("stale", c.stale),
        ("updating", c.updating),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use nginx_vts_common::{Connections, ZoneResponses, decode_status};
    use std::collections::HashMap;

    fn of(samples: &[Sample], family: Family) -> Vec<&Sample> {
        samples.iter().filter(|s| s.family == family).collect()
    }

    fn value(samples: &[Sample], family: Family, labels: &[(&str, &str)]) -> Option<f64> {
        samples
            .iter()
            .find(|s| {
                s.family == family && labels.iter().all(|(k, v)| s.label(k) == Some(*v))
            })
            .map(|s| s.value)
    }

    fn member(server: &str, requests: u64, two_xx: u64, in_bytes: u64) -> MemberStats {
        MemberStats {
            server: server.to_string(),
            request_counter: requests,
            in_bytes,
            out_bytes: in_bytes * 2,
            responses: ResponseClasses {
                two_xx,
                ..Default::default()
            },
            response_msec: 7,
            request_msec: 9,
            ..Default::default()
        }
    }

    #[test]
    fn test_metric_names() {
        assert_eq!(
            Family::ServerConnections.metric_name("nginx"),
            "nginx_server_connections"
        );
        assert_eq!(
            Family::UpstreamResponseMsec.metric_name("nginx"),
            "nginx_upstream_responseMsec"
        );
        assert_eq!(Family::CacheBytes.metric_name(""), "cache_bytes");
        assert_eq!(
            build_metric_name("edge", Subsystem::Filter, "requests"),
            "edge_filter_requests"
        );
    }

    #[test]
    fn test_every_family_ends_with_host_label() {
        for family in Family::ALL {
            assert_eq!(family.label_keys().last(), Some(&HOST_LABEL), "{:?}", family);
        }
    }

    #[test]
    fn test_exactly_seven_connection_samples_for_zero_snapshot() {
        let samples = map_snapshot(&StatusSnapshot::default(), "");
        let connections = of(&samples, Family::ServerConnections);

        assert_eq!(connections.len(), 7);
        assert!(connections.iter().all(|s| s.value == 0.0));

        let mut statuses: Vec<_> = connections
            .iter()
            .map(|s| s.label("status").unwrap())
            .collect();
        statuses.sort();
        assert_eq!(
            statuses,
            vec![
                "accepted", "active", "handled", "reading", "requests", "waiting", "writing"
            ]
        );
    }

    #[test]
    fn test_active_connections_round_trip() {
        let snapshot = StatusSnapshot {
            connections: Connections {
                active: 5,
                ..Default::default()
            },
            ..Default::default()
        };
        let samples = map_snapshot(&snapshot, "");

        let active: Vec<_> = of(&samples, Family::ServerConnections)
            .into_iter()
            .filter(|s| s.label("status") == Some("active"))
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].value, 5.0);
        assert_eq!(active[0].labels, vec![("status", "active".to_string())]);
    }

    #[test]
    fn test_host_label_added_when_resolved() {
        let samples = map_snapshot(&StatusSnapshot::default(), "web01");

        assert!(
            samples
                .iter()
                .all(|s| s.label(HOST_LABEL) == Some("web01"))
        );
    }

    #[test]
    fn test_resolve_host() {
        let snapshot = StatusSnapshot {
            host_name: "reported".to_string(),
            ..Default::default()
        };

        assert_eq!(resolve_host(Some("override"), &snapshot), "override");
        assert_eq!(resolve_host(None, &snapshot), "reported");
    }

    #[test]
    fn test_info_sample() {
        let snapshot = StatusSnapshot {
            host_name: "web01".to_string(),
            nginx_version: "1.25.3".to_string(),
            load_msec: 1_000,
            now_msec: 3_601_000,
            ..Default::default()
        };
        let samples = map_snapshot(&snapshot, resolve_host(None, &snapshot));

        let info = of(&samples, Family::ServerInfo);
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].value, 3600.0);
        assert_eq!(
            info[0].labels,
            vec![
                ("nginxVersion", "1.25.3".to_string()),
                (HOST_LABEL, "web01".to_string())
            ]
        );
    }

    #[test]
    fn test_server_zone_samples() {
        let json = r#"{"connections":{"active":1,"reading":0,"writing":1,"waiting":0,"accepted":10,"handled":10,"requests":10},"serverZones":{"example.com":{"requestCounter":3,"inBytes":100,"outBytes":200,"responses":{"2xx":3}}},"upstreamZones":{},"cacheZones":{}}"#;
        let snapshot = decode_status(json.as_bytes()).unwrap();
        let samples = map_snapshot(&snapshot, "");

        let two_xx: Vec<_> = of(&samples, Family::ServerRequests)
            .into_iter()
            .filter(|s| s.label("code") == Some("2xx"))
            .collect();
        assert_eq!(two_xx.len(), 1);
        assert_eq!(
            two_xx[0].labels,
            vec![
                ("host", "example.com".to_string()),
                ("code", "2xx".to_string())
            ]
        );
        assert_eq!(two_xx[0].value, 3.0);

        assert_eq!(
            value(
                &samples,
                Family::ServerBytes,
                &[("host", "example.com"), ("direction", "in")]
            ),
            Some(100.0)
        );
        assert_eq!(
            value(
                &samples,
                Family::ServerRequests,
                &[("host", "example.com"), ("code", "total")]
            ),
            Some(3.0)
        );
        assert_eq!(of(&samples, Family::ServerRequests).len(), 6);
        assert_eq!(of(&samples, Family::ServerCache).len(), 8);
        assert_eq!(of(&samples, Family::ServerBytes).len(), 2);
        // No requestMsec in the document, so no latency sample.
        assert!(of(&samples, Family::ServerRequestMsec).is_empty());
        assert!(of(&samples, Family::ServerOverCounts).is_empty());
    }

    #[test]
    fn test_server_zone_latency_and_cache() {
        let mut zones = HashMap::new();
        zones.insert(
            "*".to_string(),
            ZoneStats {
                request_msec: Some(42),
                responses: ZoneResponses {
                    cache: CacheOutcomes {
                        hit: 11,
                        scarce: 2,
                        ..Default::default()
                    },
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        let snapshot = StatusSnapshot {
            server_zones: zones,
            ..Default::default()
        };
        let samples = map_snapshot(&snapshot, "");

        assert_eq!(
            value(&samples, Family::ServerRequestMsec, &[("host", "*")]),
            Some(42.0)
        );
        assert_eq!(
            value(
                &samples,
                Family::ServerCache,
                &[("host", "*"), ("status", "hit")]
            ),
            Some(11.0)
        );
        assert_eq!(
            value(
                &samples,
                Family::ServerCache,
                &[("host", "*"), ("status", "scarce")]
            ),
            Some(2.0)
        );
    }

    #[test]
    fn test_upstream_group_sums_members() {
        let mut groups = HashMap::new();
        groups.insert(
            "backend".to_string(),
            vec![
                member("10.0.0.1:80", 10, 9, 100),
                member("10.0.0.2:80", 5, 4, 50),
                member("10.0.0.3:80", 1, 1, 1),
            ],
        );
        let snapshot = StatusSnapshot {
            upstream_zones: groups,
            ..Default::default()
        };
        let samples = map_snapshot(&snapshot, "");

        let requests = of(&samples, Family::UpstreamRequests);
        assert_eq!(requests.len(), 6);
        assert!(requests.iter().all(|s| s.label("backend").is_none()));

        assert_eq!(
            value(
                &samples,
                Family::UpstreamRequests,
                &[("upstream", "backend"), ("code", "total")]
            ),
            Some(16.0)
        );
        assert_eq!(
            value(
                &samples,
                Family::UpstreamRequests,
                &[("upstream", "backend"), ("code", "2xx")]
            ),
            Some(14.0)
        );
        assert_eq!(
            value(
                &samples,
                Family::UpstreamBytes,
                &[("upstream", "backend"), ("direction", "in")]
            ),
            Some(151.0)
        );
        assert_eq!(
            value(
                &samples,
                Family::UpstreamBytes,
                &[("upstream", "backend"), ("direction", "out")]
            ),
            Some(302.0)
        );

        // Latency stays per member.
        assert_eq!(of(&samples, Family::UpstreamResponseMsec).len(), 3);
        assert_eq!(of(&samples, Family::UpstreamRequestMsec).len(), 3);
        assert_eq!(
            value(
                &samples,
                Family::UpstreamResponseMsec,
                &[("upstream", "backend"), ("backend", "10.0.0.2:80")]
            ),
            Some(7.0)
        );
    }

    #[test]
    fn test_upstream_sum_is_integer_exact() {
        let big = (1u64 << 52) + 1;
        let mut groups = HashMap::new();
        groups.insert(
            "g".to_string(),
            vec![member("a", big, 0, 0), member("b", big, 0, 0)],
        );
        let snapshot = StatusSnapshot {
            upstream_zones: groups,
            ..Default::default()
        };
        let samples = map_snapshot(&snapshot, "");

        let total = value(
            &samples,
            Family::UpstreamRequests,
            &[("upstream", "g"), ("code", "total")],
        )
        .unwrap();
        assert_eq!(total, (2 * big) as f64);
        assert_eq!(total as u64, 2 * big);
    }

    #[test]
    fn test_upstream_group_without_members_emits_zero_counters() {
        let mut groups = HashMap::new();
        groups.insert("empty".to_string(), Vec::new());
        let snapshot = StatusSnapshot {
            upstream_zones: groups,
            ..Default::default()
        };
        let samples = map_snapshot(&snapshot, "");

        let requests = of(&samples, Family::UpstreamRequests);
        let bytes = of(&samples, Family::UpstreamBytes);
        assert_eq!(requests.len(), 6);
        assert_eq!(bytes.len(), 2);
        assert!(requests.iter().chain(bytes.iter()).all(|s| s.value == 0.0));
        assert!(of(&samples, Family::UpstreamResponseMsec).is_empty());
    }

    #[test]
    fn test_upstream_overflow_summed_over_members() {
        let mut a = member("a", 1, 1, 1);
        a.over_counts = Some(OverCounts {
            max_integer_size: 100.0,
            request_counter: Some(2),
            ..Default::default()
        });
        let mut b = member("b", 1, 1, 1);
        b.over_counts = Some(OverCounts {
            max_integer_size: 100.0,
            request_counter: Some(1),
            in_bytes: Some(3),
            ..Default::default()
        });
        let mut groups = HashMap::new();
        groups.insert("g".to_string(), vec![a, b]);
        let snapshot = StatusSnapshot {
            upstream_zones: groups,
            ..Default::default()
        };
        let samples = map_snapshot(&snapshot, "");

        assert_eq!(
            value(
                &samples,
                Family::UpstreamOverCounts,
                &[("upstream", "g"), ("counter", "requestCounter")]
            ),
            Some(300.0)
        );
        assert_eq!(
            value(
                &samples,
                Family::UpstreamOverCounts,
                &[("upstream", "g"), ("counter", "inBytes")]
            ),
            Some(300.0)
        );
        // The raw counter is not adjusted.
        assert_eq!(
            value(
                &samples,
                Family::UpstreamRequests,
                &[("upstream", "g"), ("code", "total")]
            ),
            Some(2.0)
        );
    }

    #[test]
    fn test_missing_filter_zones_produce_no_filter_samples() {
        let snapshot = decode_status(br#"{"serverZones": {"a": {}}}"#).unwrap();
        let samples = map_snapshot(&snapshot, "");

        assert!(
            samples
                .iter()
                .all(|s| s.family.subsystem() != Subsystem::Filter)
        );
    }

    #[test]
    fn test_filter_zone_samples() {
        let json = r#"{"filterZones": {"country": {
            "KR": {"requestCounter": 4, "inBytes": 10, "outBytes": 20,
                   "responses": {"2xx": 3, "4xx": 1}, "responseMsec": 5, "requestMsec": 6}
        }}}"#;
        let snapshot = decode_status(json.as_bytes()).unwrap();
        let samples = map_snapshot(&snapshot, "");

        let base = [("filter", "country"), ("filterName", "KR")];
        assert_eq!(
            value(
                &samples,
                Family::FilterRequests,
                &[base[0], base[1], ("code", "total")]
            ),
            Some(4.0)
        );
        assert_eq!(
            value(
                &samples,
                Family::FilterRequests,
                &[base[0], base[1], ("code", "4xx")]
            ),
            Some(1.0)
        );
        assert_eq!(
            value(
                &samples,
                Family::FilterBytes,
                &[base[0], base[1], ("direction", "out")]
            ),
            Some(20.0)
        );
        assert_eq!(value(&samples, Family::FilterResponseMsec, &base), Some(5.0));
        assert_eq!(value(&samples, Family::FilterRequestMsec, &base), Some(6.0));
        assert_eq!(of(&samples, Family::FilterRequests).len(), 6);
    }

    #[test]
    fn test_cache_zone_samples() {
        let json = r#"{"cacheZones": {"static": {
            "maxSize": 1000, "usedSize": 250, "inBytes": 1, "outBytes": 2,
            "responses": {"hit": 8, "miss": 2},
            "overCounts": {"maxIntegerSize": 18446744073709551615, "hit": 1}
        }}}"#;
        let snapshot = decode_status(json.as_bytes()).unwrap();
        let samples = map_snapshot(&snapshot, "");

        let requests = of(&samples, Family::CacheRequests);
        assert_eq!(requests.len(), 8);
        assert!(requests.iter().all(|s| s.label("code").is_none()));
        assert_eq!(
            value(
                &samples,
                Family::CacheRequests,
                &[("zone", "static"), ("status", "hit")]
            ),
            Some(8.0)
        );
        assert_eq!(
            value(
                &samples,
                Family::CacheSize,
                &[("zone", "static"), ("type", "used")]
            ),
            Some(250.0)
        );
        assert_eq!(
            value(
                &samples,
                Family::CacheOverCounts,
                &[("zone", "static"), ("counter", "hit")]
            ),
            Some(18446744073709551615.0)
        );
        assert_eq!(of(&samples, Family::CacheOverCounts).len(), 1);
    }

    #[test]
    fn test_zone_names_used_verbatim() {
        let mut zones = HashMap::new();
        zones.insert("Ünïcode \"zone\"".to_string(), ZoneStats::default());
        let snapshot = StatusSnapshot {
            server_zones: zones,
            ..Default::default()
        };
        let samples = map_snapshot(&snapshot, "");

        assert!(
            of(&samples, Family::ServerBytes)
                .iter()
                .all(|s| s.label("host") == Some("Ünïcode \"zone\""))
        );
    }

    #[test]
    fn test_prometheus_type() {
        assert_eq!(
            Family::ServerConnections.metric_type(),
            PrometheusType::Gauge
        );
        assert_eq!(Family::ServerRequests.metric_type(), PrometheusType::Counter);
        assert_eq!(
            Family::UpstreamRequestMsec.metric_type(),
            PrometheusType::Gauge
        );
        assert_eq!(PrometheusType::Counter.as_str(), "counter");
    }
}
