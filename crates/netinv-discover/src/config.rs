//! Configuration for the netinv-discover engine.

use std::path::PathBuf;
use std::time::Duration;

use netinv_core::NeighborProtocol;
use serde::Deserialize;

use crate::error::{DiscoverError, Result};

/// Top-level discover configuration.
///
/// Loaded from `netinv.toml` `[discover]` section or
/// `NETINV_DISCOVER__` environment variables. Treated as read-only once a
/// batch starts.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverConfig {
    /// Network specs to scan (`10.0.1.7`, `10.0.1.10-40`, `10.0.1.0/24`).
    #[serde(default)]
    pub networks: Vec<String>,

    /// SNMP communities in trial order.
    #[serde(default = "default_communities")]
    pub communities: Vec<String>,

    /// Neighbor protocols in trial order.
    #[serde(default = "default_protocols")]
    pub protocols: Vec<NeighborProtocol>,

    /// Maximum number of probes or walks in flight at once.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Per-attempt SNMP GET timeout in seconds.
    #[serde(default = "default_snmp_timeout")]
    pub snmp_timeout_secs: u64,

    /// Transport-level retries per request.
    #[serde(default = "default_snmp_retries")]
    pub snmp_retries: u32,

    /// Per-attempt timeout for neighbor table walks in seconds.
    #[serde(default = "default_walk_timeout")]
    pub walk_timeout_secs: u64,

    /// Ping each address before querying it.
    #[serde(default = "default_true")]
    pub liveness_check: bool,

    #[serde(default = "default_liveness_timeout")]
    pub liveness_timeout_ms: u64,

    /// Also request ifPhysAddress.1.
    #[serde(default = "default_true")]
    pub collect_mac: bool,

    /// Also request sysDescr.0.
    #[serde(default = "default_true")]
    pub collect_description: bool,

    #[serde(default = "default_snmpget_path")]
    pub snmpget_path: String,

    #[serde(default = "default_snmpwalk_path")]
    pub snmpwalk_path: String,

    #[serde(default = "default_ping_path")]
    pub ping_path: String,

    /// Directory holding the host and neighbor caches.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl DiscoverConfig {
    /// Reject configurations that would make every probe meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.communities.is_empty() {
            return Err(DiscoverError::Config(
                "at least one SNMP community is required".to_string(),
            ));
        }
        if self.communities.iter().any(|c| c.is_empty()) {
            return Err(DiscoverError::Config(
                "SNMP communities must not be empty strings".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(DiscoverError::Config(
                "max_workers must be greater than zero".to_string(),
            ));
        }
        if self.snmp_timeout_secs == 0 || self.walk_timeout_secs == 0 {
            return Err(DiscoverError::Config(
                "SNMP timeouts must be greater than zero".to_string(),
            ));
        }
        if self.protocols.is_empty() {
            return Err(DiscoverError::Config(
                "at least one neighbor protocol is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn snmp_timeout(&self) -> Duration {
        Duration::from_secs(self.snmp_timeout_secs)
    }

    pub fn walk_timeout(&self) -> Duration {
        Duration::from_secs(self.walk_timeout_secs)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn host_cache_path(&self) -> PathBuf {
        self.cache_dir.join("hosts.jsonl")
    }

    pub fn neighbor_cache_path(&self) -> PathBuf {
        self.cache_dir.join("neighbors.jsonl")
    }
}

fn default_communities() -> Vec<String> {
    vec!["public".to_string()]
}

fn default_protocols() -> Vec<NeighborProtocol> {
    vec![NeighborProtocol::Cdp, NeighborProtocol::Lldp]
}

fn default_max_workers() -> usize {
    20
}

fn default_snmp_timeout() -> u64 {
    2
}

fn default_snmp_retries() -> u32 {
    1
}

fn default_walk_timeout() -> u64 {
    5
}

fn default_liveness_timeout() -> u64 {
    1000
}

fn default_snmpget_path() -> String {
    "snmpget".to_string()
}

fn default_snmpwalk_path() -> String {
    "snmpwalk".to_string()
}

fn default_ping_path() -> String {
    "ping".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./inventory")
}

fn default_true() -> bool {
    true
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            networks: Vec::new(),
            communities: default_communities(),
            protocols: default_protocols(),
            max_workers: default_max_workers(),
            snmp_timeout_secs: default_snmp_timeout(),
            snmp_retries: default_snmp_retries(),
            walk_timeout_secs: default_walk_timeout(),
            liveness_check: true,
            liveness_timeout_ms: default_liveness_timeout(),
            collect_mac: true,
            collect_description: true,
            snmpget_path: default_snmpget_path(),
            snmpwalk_path: default_snmpwalk_path(),
            ping_path: default_ping_path(),
            cache_dir: default_cache_dir(),
        }
    }
}
