//! End-to-end tests for host and neighbor discovery against in-memory
//! transports.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;

use netinv_core::{HostRecord, NeighborProtocol, UNKNOWN_ADDRESS};
use netinv_discover::config::DiscoverConfig;
use netinv_discover::liveness::{LivenessProbe, PingProbe};
use netinv_discover::oids;
use netinv_discover::orchestrator::{BatchOutcome, Orchestrator};
use netinv_discover::response::{VarValue, WalkEntry};
use netinv_discover::sink::MemorySink;
use netinv_discover::transport::SnmpTransport;
use netinv_discover::{DiscoverError, TransportError};

// ── Fakes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Get { address: Ipv4Addr, community: String },
    Walk { address: Ipv4Addr, community: String, root: String },
}

#[derive(Default)]
struct FakeTransport {
    /// (address, community) → sysName
    hostnames: HashMap<(Ipv4Addr, String), String>,
    /// (address, community, root) → walk output
    tables: HashMap<(Ipv4Addr, String, String), Vec<WalkEntry>>,
    delay: Duration,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeTransport {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn host(mut self, address: Ipv4Addr, community: &str, hostname: &str) -> Self {
        self.hostnames
            .insert((address, community.to_string()), hostname.to_string());
        self
    }

    fn table(
        mut self,
        address: Ipv4Addr,
        community: &str,
        root: &str,
        entries: Vec<WalkEntry>,
    ) -> Self {
        self.tables
            .insert((address, community.to_string(), root.to_string()), entries);
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn simulate_io(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SnmpTransport for FakeTransport {
    async fn get_many(
        &self,
        address: Ipv4Addr,
        community: &str,
        oids: &[String],
        _timeout: Duration,
        _retries: u32,
    ) -> Result<Vec<VarValue>, TransportError> {
        self.calls.lock().unwrap().push(Call::Get {
            address,
            community: community.to_string(),
        });
        self.simulate_io().await;

        let hostname = self
            .hostnames
            .get(&(address, community.to_string()))
            .ok_or(TransportError::NoResponse {
                address: address.to_string(),
            })?;
        let mut values = vec![VarValue::Value(hostname.clone())];
        values.resize(oids.len(), VarValue::NoSuchObject);
        Ok(values)
    }

    async fn walk(
        &self,
        address: Ipv4Addr,
        community: &str,
        root: &str,
        _timeout: Duration,
        _retries: u32,
    ) -> Result<Vec<WalkEntry>, TransportError> {
        self.calls.lock().unwrap().push(Call::Walk {
            address,
            community: community.to_string(),
            root: root.to_string(),
        });
        self.simulate_io().await;

        Ok(self
            .tables
            .get(&(address, community.to_string(), root.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Liveness probe that reports only a fixed set of addresses as alive.
struct FixedLiveness {
    alive: HashSet<Ipv4Addr>,
}

#[async_trait]
impl LivenessProbe for FixedLiveness {
    async fn is_alive(&self, address: Ipv4Addr, _timeout: Duration) -> bool {
        self.alive.contains(&address)
    }
}

// ── Helpers ───────────────────────────────────────────────────────

fn config(communities: &[&str], workers: usize) -> DiscoverConfig {
    DiscoverConfig {
        communities: communities.iter().map(|c| c.to_string()).collect(),
        max_workers: workers,
        liveness_check: false,
        ..DiscoverConfig::default()
    }
}

fn addr(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, last)
}

fn switch(last: u8) -> HostRecord {
    HostRecord {
        address: addr(last),
        hostname: format!("sw-{last}"),
        serial_number: format!("FOC{last:04}"),
        mac_address: None,
        description: None,
        community: "public".to_string(),
        discovered_at: Utc::now(),
    }
}

fn entry(oid: String, value: &str) -> WalkEntry {
    WalkEntry::new(oid, VarValue::Value(value.to_string()))
}

fn cdp_neighbor(if_index: u32, name: &str, hex_ip: &str) -> Vec<WalkEntry> {
    let root = oids::CDP_CACHE_ENTRY;
    vec![
        entry(format!("{root}.4.{if_index}.1"), hex_ip),
        entry(format!("{root}.6.{if_index}.1"), name),
        entry(format!("{root}.8.{if_index}.1"), "cisco C9300-48P"),
    ]
}

// ── Host discovery ────────────────────────────────────────────────

#[tokio::test]
async fn test_worker_cap_bounds_concurrency_and_duration() {
    let delay = Duration::from_millis(100);
    let mut transport = FakeTransport::with_delay(delay);
    for last in 1..=12 {
        transport = transport.host(addr(last), "public", &format!("dev-{last}"));
    }
    let transport = Arc::new(transport);
    let sink = Arc::new(MemorySink::new());

    let orchestrator = Orchestrator::new(config(&["public"], 5), transport.clone()).unwrap();
    let started = Instant::now();
    let outcome = orchestrator
        .discover_hosts(&["10.0.0.1-12"], sink.clone())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(transport.peak() <= 5, "peak in flight was {}", transport.peak());
    // ceil(12 / 5) = 3 rounds of one delay each.
    assert!(elapsed >= delay * 3, "finished too fast: {elapsed:?}");
    assert!(elapsed < delay * 3 + Duration::from_millis(400), "too slow: {elapsed:?}");

    assert!(matches!(outcome, BatchOutcome::Found(_)));
    assert_eq!(outcome.summary().succeeded, 12);
    assert_eq!(sink.hosts().len(), 12);
}

#[tokio::test]
async fn test_community_fallback_stops_at_first_success() {
    let transport = Arc::new(
        FakeTransport::default()
            .host(addr(5), "bravo", "core-5")
            .host(addr(5), "charlie", "core-5-alt"),
    );
    let sink = Arc::new(MemorySink::new());

    let orchestrator =
        Orchestrator::new(config(&["alpha", "bravo", "charlie"], 4), transport.clone()).unwrap();
    orchestrator
        .discover_hosts(&["10.0.0.5"], sink.clone())
        .await
        .unwrap();

    let hosts = sink.hosts();
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].hostname, "core-5");
    assert_eq!(hosts[0].community, "bravo");
    assert_eq!(hosts[0].serial_number, "");

    let tried: Vec<String> = transport
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Get { community, .. } => Some(community),
            Call::Walk { .. } => None,
        })
        .collect();
    assert_eq!(tried, vec!["alpha", "bravo"]);
}

#[tokio::test]
async fn test_not_found_hosts_are_dropped() {
    let transport = Arc::new(FakeTransport::default().host(addr(2), "public", "only-one"));
    let sink = Arc::new(MemorySink::new());

    let orchestrator = Orchestrator::new(config(&["public"], 3), transport).unwrap();
    let outcome = orchestrator
        .discover_hosts(&["10.0.0.1-4"], sink.clone())
        .await
        .unwrap();

    let summary = outcome.summary();
    assert_eq!(summary.candidates, 4);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.records, 1);
    assert_eq!(sink.hosts()[0].address, addr(2));
}

#[tokio::test]
async fn test_zero_live_candidates_is_exhausted() {
    let transport = Arc::new(FakeTransport::default().host(addr(1), "public", "unreachable"));
    let sink = Arc::new(MemorySink::new());

    let mut cfg = config(&["public"], 5);
    cfg.liveness_check = true;
    let orchestrator = Orchestrator::new(cfg, transport.clone())
        .unwrap()
        .with_liveness(Arc::new(FixedLiveness {
            alive: HashSet::new(),
        }));

    let outcome = orchestrator
        .discover_hosts(&["10.0.0.0/24"], sink.clone())
        .await
        .unwrap();

    assert!(outcome.is_exhausted());
    assert_eq!(outcome.summary().addresses, 254);
    assert_eq!(outcome.summary().candidates, 0);
    assert!(transport.calls().is_empty());
    assert!(sink.hosts().is_empty());
}

#[tokio::test]
async fn test_liveness_filters_candidates() {
    let transport = Arc::new(
        FakeTransport::default()
            .host(addr(2), "public", "two")
            .host(addr(3), "public", "three"),
    );
    let sink = Arc::new(MemorySink::new());

    let mut cfg = config(&["public"], 5);
    cfg.liveness_check = true;
    let orchestrator = Orchestrator::new(cfg, transport.clone())
        .unwrap()
        .with_liveness(Arc::new(FixedLiveness {
            alive: [addr(2), addr(4)].into_iter().collect(),
        }));

    let outcome = orchestrator
        .discover_hosts(&["10.0.0.1-6"], sink.clone())
        .await
        .unwrap();

    assert_eq!(outcome.summary().candidates, 2);
    assert_eq!(transport.calls().len(), 2);
    let hosts = sink.hosts();
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].hostname, "two");
}

#[tokio::test]
async fn test_missing_liveness_probe_falls_back_to_all() {
    let transport = Arc::new(FakeTransport::default().host(addr(1), "public", "one"));
    let sink = Arc::new(MemorySink::new());

    let mut cfg = config(&["public"], 2);
    cfg.liveness_check = true;
    let orchestrator = Orchestrator::new(cfg, transport).unwrap();

    let outcome = orchestrator
        .discover_hosts(&["10.0.0.1-3"], sink)
        .await
        .unwrap();
    assert_eq!(outcome.summary().candidates, 3);
    assert_eq!(outcome.summary().succeeded, 1);
}

#[tokio::test]
async fn test_unusable_ping_falls_back_to_all() {
    let transport = Arc::new(
        FakeTransport::default()
            .host(addr(1), "public", "one")
            .host(addr(2), "public", "two")
            .host(addr(3), "public", "three"),
    );
    let sink = Arc::new(MemorySink::new());

    let mut cfg = config(&["public"], 2);
    cfg.liveness_check = true;
    let orchestrator = Orchestrator::new(cfg, transport)
        .unwrap()
        .with_liveness(Arc::new(PingProbe::new("/nonexistent/ping")));

    let outcome = orchestrator
        .discover_hosts(&["10.0.0.1-3"], sink.clone())
        .await
        .unwrap();
    assert!(!outcome.is_exhausted());
    assert_eq!(outcome.summary().candidates, 3);
    assert_eq!(outcome.summary().succeeded, 3);
    assert_eq!(sink.hosts().len(), 3);
}

#[tokio::test]
async fn test_no_snmp_anywhere_is_exhausted() {
    let transport = Arc::new(FakeTransport::default());
    let sink = Arc::new(MemorySink::new());

    let orchestrator =
        Orchestrator::new(config(&["public", "private"], 8), transport.clone()).unwrap();
    let outcome = orchestrator
        .discover_hosts(&["10.0.0.1-10"], sink)
        .await
        .unwrap();

    assert!(matches!(outcome, BatchOutcome::Exhausted(_)));
    assert_eq!(outcome.summary().candidates, 10);
    // Every community is tried for every silent address.
    assert_eq!(transport.calls().len(), 20);
}

#[tokio::test]
async fn test_bad_spec_skipped_but_siblings_run() {
    let transport = Arc::new(FakeTransport::default().host(addr(1), "public", "one"));
    let sink = Arc::new(MemorySink::new());

    let orchestrator = Orchestrator::new(config(&["public"], 2), transport).unwrap();
    let outcome = orchestrator
        .discover_hosts(&["10.0.0.50-10", "10.0.0.1"], sink.clone())
        .await
        .unwrap();

    assert_eq!(outcome.summary().skipped_specs, 1);
    assert_eq!(outcome.summary().succeeded, 1);
}

#[tokio::test]
async fn test_all_specs_bad_is_an_error() {
    let transport = Arc::new(FakeTransport::default());
    let orchestrator = Orchestrator::new(config(&["public"], 2), transport.clone()).unwrap();

    let err = orchestrator
        .discover_hosts(&["10.0.0.0/16"], Arc::new(MemorySink::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoverError::InvalidSpec(_)));
    assert!(transport.calls().is_empty());
}

#[test]
fn test_invalid_config_rejected_up_front() {
    let transport = Arc::new(FakeTransport::default());

    let err = Orchestrator::new(config(&[], 5), transport.clone()).err().unwrap();
    assert!(matches!(err, DiscoverError::Config(_)));

    let err = Orchestrator::new(config(&["public"], 0), transport).err().unwrap();
    assert!(matches!(err, DiscoverError::Config(_)));
}

// ── Neighbor discovery ────────────────────────────────────────────

#[tokio::test]
async fn test_lldp_used_when_cdp_is_empty() {
    let lldp = vec![
        entry(format!("{}.0.7.1", oids::LLDP_REM_SYS_NAME), "ap-lobby"),
        entry(format!("{}.0.7.1", oids::LLDP_REM_PORT_ID), "eth0"),
    ];
    let transport = Arc::new(FakeTransport::default().table(
        addr(1),
        "public",
        oids::LLDP_REMOTE_SYSTEMS,
        lldp,
    ));
    let sink = Arc::new(MemorySink::new());

    let orchestrator = Orchestrator::new(config(&["public"], 4), transport.clone()).unwrap();
    let outcome = orchestrator
        .discover_neighbors(&[switch(1)], sink.clone())
        .await
        .unwrap();

    assert!(!outcome.is_exhausted());
    let neighbors = sink.neighbors();
    assert_eq!(neighbors.len(), 1);
    assert_eq!(neighbors[0].protocol, NeighborProtocol::Lldp);
    assert_eq!(neighbors[0].neighbor_hostname, "ap-lobby");
    assert_eq!(neighbors[0].neighbor_address, UNKNOWN_ADDRESS);
    assert_eq!(neighbors[0].source_switch, addr(1));

    let walked: Vec<String> = transport
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Walk { root, .. } => Some(root),
            Call::Get { .. } => None,
        })
        .collect();
    assert_eq!(walked, vec![oids::CDP_CACHE_ENTRY, oids::LLDP_REMOTE_SYSTEMS]);
}

#[tokio::test]
async fn test_first_protocol_and_community_win() {
    let transport = Arc::new(
        FakeTransport::default()
            .table(addr(1), "private", oids::CDP_CACHE_ENTRY, {
                let mut rows = cdp_neighbor(3, "dist-1", "C0 A8 01 01");
                rows.extend(cdp_neighbor(4, "dist-2", "C0 A8 01 02"));
                rows
            })
            .table(
                addr(1),
                "private",
                oids::LLDP_REMOTE_SYSTEMS,
                vec![entry(format!("{}.0.9.1", oids::LLDP_REM_SYS_NAME), "never-read")],
            ),
    );
    let sink = Arc::new(MemorySink::new());

    let orchestrator =
        Orchestrator::new(config(&["public", "private"], 4), transport.clone()).unwrap();
    let outcome = orchestrator
        .discover_neighbors(&[switch(1)], sink.clone())
        .await
        .unwrap();

    assert_eq!(outcome.summary().succeeded, 1);
    assert_eq!(outcome.summary().records, 2);

    let names: HashSet<String> = sink
        .neighbors()
        .into_iter()
        .inspect(|n| assert_eq!(n.protocol, NeighborProtocol::Cdp))
        .map(|n| n.neighbor_hostname)
        .collect();
    assert_eq!(names, HashSet::from(["dist-1".to_string(), "dist-2".to_string()]));

    // public/CDP, then private/CDP; LLDP is never walked.
    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test]
async fn test_silent_switch_does_not_fail_batch() {
    let transport = Arc::new(FakeTransport::default().table(
        addr(2),
        "public",
        oids::CDP_CACHE_ENTRY,
        cdp_neighbor(1, "edge-9", "0A000009"),
    ));
    let sink = Arc::new(MemorySink::new());

    let orchestrator = Orchestrator::new(config(&["public"], 4), transport).unwrap();
    let outcome = orchestrator
        .discover_neighbors(&[switch(1), switch(2), switch(3)], sink.clone())
        .await
        .unwrap();

    let summary = outcome.summary();
    assert_eq!(summary.candidates, 3);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(sink.neighbors()[0].neighbor_address, "10.0.0.9");
}

#[tokio::test]
async fn test_no_neighbors_anywhere_is_exhausted() {
    let transport = Arc::new(FakeTransport::default());
    let orchestrator = Orchestrator::new(config(&["public"], 4), transport).unwrap();

    let outcome = orchestrator
        .discover_neighbors(&[switch(1), switch(2)], Arc::new(MemorySink::new()))
        .await
        .unwrap();
    assert!(outcome.is_exhausted());
}
