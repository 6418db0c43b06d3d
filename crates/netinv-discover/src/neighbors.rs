//! CDP and LLDP neighbor table decoding.
//!
//! A neighbor table arrives as one walk whose lines each carry a single
//! column of a single neighbor. Lines are grouped by their index suffix and
//! a record is emitted once a group holds enough columns to be useful.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use netinv_core::{NeighborProtocol, NeighborRecord, UNKNOWN_ADDRESS};

use crate::oids::{self, cdp_column};
use crate::response::{self, WalkEntry};
use crate::transport::SnmpTransport;

/// LLDP-MIB address family number for IPv4 management addresses.
const LLDP_ADDR_SUBTYPE_IPV4: u32 = 1;

/// Walks a switch's neighbor table and decodes it into records.
#[derive(Clone)]
pub struct NeighborDecoder {
    transport: Arc<dyn SnmpTransport>,
    timeout: Duration,
    retries: u32,
}

impl NeighborDecoder {
    pub fn new(transport: Arc<dyn SnmpTransport>, timeout: Duration, retries: u32) -> Self {
        Self {
            transport,
            timeout,
            retries,
        }
    }

    /// Walk `switch` with one community and protocol.
    ///
    /// Returns `None` when the walk failed or produced no neighbors.
    pub async fn decode(
        &self,
        switch: Ipv4Addr,
        community: &str,
        protocol: NeighborProtocol,
    ) -> Option<Vec<NeighborRecord>> {
        let root = match protocol {
            NeighborProtocol::Cdp => oids::CDP_CACHE_ENTRY,
            NeighborProtocol::Lldp => oids::LLDP_REMOTE_SYSTEMS,
        };

        let entries = match self
            .transport
            .walk(switch, community, root, self.timeout, self.retries)
            .await
        {
            Ok(entries) => entries,
            Err(e) if e.is_no_response() => {
                tracing::debug!(
                    switch = %switch,
                    protocol = %protocol,
                    "No response to neighbor walk"
                );
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    switch = %switch,
                    protocol = %protocol,
                    error = %e,
                    "Neighbor walk failed"
                );
                return None;
            }
        };

        let now = Utc::now();
        let records = match protocol {
            NeighborProtocol::Cdp => decode_cdp(&entries, switch, now),
            NeighborProtocol::Lldp => decode_lldp(&entries, switch, now),
        };

        tracing::debug!(
            switch = %switch,
            protocol = %protocol,
            lines = entries.len(),
            neighbors = records.len(),
            "Decoded neighbor table"
        );

        (!records.is_empty()).then_some(records)
    }
}

/// Convert a 4-byte address value to an IPv4 address.
///
/// Accepts a 4-byte string net-snmp printed as text because every byte was
/// printable or whitespace, hex forms (`C0 A8 01 01`, `C0A80101`,
/// `0xC0A80101`), or an already dotted quad.
pub fn hex_to_ipv4(raw: &str) -> Option<Ipv4Addr> {
    // Checked untrimmed: whitespace bytes are part of the address. No hex
    // or dotted form is four characters long.
    if let Ok(octets) = <[u8; 4]>::try_from(raw.as_bytes()) {
        return Some(Ipv4Addr::from(octets));
    }
    let trimmed = raw.trim().trim_matches('"').trim();
    if let Ok(addr) = trimmed.parse::<Ipv4Addr>() {
        return Some(addr);
    }
    let octets = response::decode_hex_octets(trimmed)?;
    <[u8; 4]>::try_from(octets.as_slice())
        .ok()
        .map(Ipv4Addr::from)
}

// ── CDP ───────────────────────────────────────────────────────────

#[derive(Default)]
struct CdpFragments {
    address: Option<Ipv4Addr>,
    device_id: Option<String>,
    platform: Option<String>,
    version: Option<String>,
    port: Option<String>,
}

/// Decode a cdpCacheEntry walk. Suffix: `column.ifIndex.deviceIndex`.
pub fn decode_cdp(
    entries: &[WalkEntry],
    switch: Ipv4Addr,
    discovered_at: DateTime<Utc>,
) -> Vec<NeighborRecord> {
    let mut table: HashMap<(u32, u32), CdpFragments> = HashMap::new();

    for entry in entries {
        let Some(value) = entry.value.as_value() else {
            continue;
        };
        let Some(index) =
            oids::suffix_of(&entry.oid, oids::CDP_CACHE_ENTRY).and_then(oids::parse_index)
        else {
            continue;
        };
        let [column, if_index, device_index] = index[..] else {
            continue;
        };

        let fragments = table.entry((if_index, device_index)).or_default();
        match column {
            cdp_column::ADDRESS => fragments.address = hex_to_ipv4(value),
            cdp_column::DEVICE_ID => fragments.device_id = Some(value.to_string()),
            cdp_column::PLATFORM => fragments.platform = Some(value.to_string()),
            cdp_column::VERSION => fragments.version = Some(value.to_string()),
            cdp_column::DEVICE_PORT => fragments.port = Some(value.to_string()),
            _ => {}
        }
    }

    table
        .into_iter()
        .filter_map(|((if_index, _), f)| {
            let address = f.address?;
            let hostname = f.device_id.filter(|d| !d.is_empty())?;
            Some(NeighborRecord {
                neighbor_address: address.to_string(),
                neighbor_hostname: hostname,
                platform: f.platform.or(f.version).unwrap_or_default(),
                local_port: if_index.to_string(),
                remote_port: f.port.unwrap_or_default(),
                source_switch: switch,
                protocol: NeighborProtocol::Cdp,
                discovered_at,
            })
        })
        .collect()
}

// ── LLDP ──────────────────────────────────────────────────────────

#[derive(Default)]
struct LldpFragments {
    address: Option<Ipv4Addr>,
    system_name: Option<String>,
    system_description: Option<String>,
    port_id: Option<String>,
}

enum LldpColumn {
    SystemName,
    SystemDescription,
    PortId,
    ManagementAddress,
}

/// Decode an lldpRemoteSystemsData walk.
///
/// The column is chosen by OID root. Remote-table suffixes are
/// `timeMark.localPort.remIndex`; management-address suffixes are
/// `column.timeMark.localPort.remIndex.subtype.len.addr...`.
pub fn decode_lldp(
    entries: &[WalkEntry],
    switch: Ipv4Addr,
    discovered_at: DateTime<Utc>,
) -> Vec<NeighborRecord> {
    let mut table: HashMap<(u32, u32), LldpFragments> = HashMap::new();

    for entry in entries {
        let Some(value) = entry.value.as_value() else {
            continue;
        };
        let Some((column, suffix)) = classify_lldp(&entry.oid) else {
            continue;
        };
        let Some(index) = oids::parse_index(suffix) else {
            continue;
        };

        match column {
            LldpColumn::ManagementAddress => {
                // Skip the column number and the time mark.
                let [_, _, local_port, rem_index, ref addr @ ..] = index[..] else {
                    continue;
                };
                let address = ipv4_from_index(addr).or_else(|| value.parse().ok());
                if address.is_some() {
                    table.entry((local_port, rem_index)).or_default().address = address;
                }
            }
            _ => {
                let [_, local_port, rem_index] = index[..] else {
                    continue;
                };
                let fragments = table.entry((local_port, rem_index)).or_default();
                let value = Some(value.to_string());
                match column {
                    LldpColumn::SystemName => fragments.system_name = value,
                    LldpColumn::SystemDescription => fragments.system_description = value,
                    LldpColumn::PortId => fragments.port_id = value,
                    LldpColumn::ManagementAddress => {}
                }
            }
        }
    }

    table
        .into_iter()
        .filter_map(|((local_port, _), f)| {
            let hostname = f.system_name.filter(|n| !n.is_empty())?;
            Some(NeighborRecord {
                neighbor_address: f
                    .address
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string()),
                neighbor_hostname: hostname,
                platform: f.system_description.unwrap_or_default(),
                local_port: local_port.to_string(),
                remote_port: f.port_id.unwrap_or_default(),
                source_switch: switch,
                protocol: NeighborProtocol::Lldp,
                discovered_at,
            })
        })
        .collect()
}

fn classify_lldp(oid: &str) -> Option<(LldpColumn, &str)> {
    [
        (oids::LLDP_REM_SYS_NAME, LldpColumn::SystemName),
        (oids::LLDP_REM_SYS_DESC, LldpColumn::SystemDescription),
        (oids::LLDP_REM_PORT_ID, LldpColumn::PortId),
        (oids::LLDP_REM_MAN_ADDR_ENTRY, LldpColumn::ManagementAddress),
    ]
    .into_iter()
    .find_map(|(root, column)| oids::suffix_of(oid, root).map(|suffix| (column, suffix)))
}

/// Decode `subtype.len.a.b.c.d` from a management-address index.
fn ipv4_from_index(addr: &[u32]) -> Option<Ipv4Addr> {
    match addr {
        [LLDP_ADDR_SUBTYPE_IPV4, 4, a, b, c, d] => Some(Ipv4Addr::new(
            u8::try_from(*a).ok()?,
            u8::try_from(*b).ok()?,
            u8::try_from(*c).ok()?,
            u8::try_from(*d).ok()?,
        )),
        _ => None,
    }
}
