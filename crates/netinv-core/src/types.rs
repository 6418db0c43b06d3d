//! Inventory records produced by the discovery engine.
//!
//! Records are plain serde values: the engine hands each one to a result
//! sink exactly once and keeps no long-lived store of its own.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Namespace UUID for deterministic record IDs.
const NETINV_NS: Uuid = Uuid::from_bytes([
    0x3c, 0x1e, 0x52, 0x07, 0x8a, 0x44, 0x4f, 0x0d, 0x9b, 0x6e, 0x21, 0xd5, 0x70, 0xa2, 0x19, 0xee,
]);

/// Placeholder address for neighbors whose table exposes no management address.
pub const UNKNOWN_ADDRESS: &str = "unknown";

// ── Hosts ─────────────────────────────────────────────────────────

/// A host that answered an SNMP identity query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostRecord {
    pub address: Ipv4Addr,
    /// sysName as reported by the device. Never empty.
    pub hostname: String,
    /// Empty when no serial-number OID answered.
    pub serial_number: String,
    pub mac_address: Option<String>,
    pub description: Option<String>,
    /// Community string that produced the answer.
    pub community: String,
    pub discovered_at: DateTime<Utc>,
}

impl HostRecord {
    /// Deterministic ID keyed on the address, so re-scans overwrite.
    pub fn record_id(&self) -> Uuid {
        Uuid::new_v5(&NETINV_NS, format!("host:{}", self.address).as_bytes())
    }

    /// Whether the device reported a serial number.
    pub fn has_serial(&self) -> bool {
        !self.serial_number.is_empty()
    }
}

// ── Neighbors ─────────────────────────────────────────────────────

/// Link-layer discovery protocol used to read a neighbor table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NeighborProtocol {
    Cdp,
    Lldp,
}

impl fmt::Display for NeighborProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cdp => write!(f, "CDP"),
            Self::Lldp => write!(f, "LLDP"),
        }
    }
}

impl FromStr for NeighborProtocol {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cdp" => Ok(Self::Cdp),
            "lldp" => Ok(Self::Lldp),
            _ => Err(CoreError::UnknownProtocol(s.to_string())),
        }
    }
}

/// One neighbor seen in a switch's CDP or LLDP table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NeighborRecord {
    /// Dotted-quad address, or [`UNKNOWN_ADDRESS`].
    pub neighbor_address: String,
    pub neighbor_hostname: String,
    /// Platform string (CDP) or system description (LLDP). May be empty.
    pub platform: String,
    /// Switch-side port index the neighbor was seen on.
    pub local_port: String,
    /// Port label reported by the neighbor. May be empty.
    pub remote_port: String,
    pub source_switch: Ipv4Addr,
    pub protocol: NeighborProtocol,
    pub discovered_at: DateTime<Utc>,
}

impl NeighborRecord {
    /// True when the topology link is known but the neighbor's address is not.
    pub fn address_unknown(&self) -> bool {
        self.neighbor_address == UNKNOWN_ADDRESS
    }
}
