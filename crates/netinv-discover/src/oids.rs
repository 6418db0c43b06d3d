//! OIDs queried during host and neighbor discovery.

/// SNMPv2-MIB sysDescr.0
pub const SYS_DESCR: &str = "1.3.6.1.2.1.1.1.0";
/// SNMPv2-MIB sysName.0
pub const SYS_NAME: &str = "1.3.6.1.2.1.1.5.0";
/// IF-MIB ifPhysAddress.1
pub const IF_PHYS_ADDRESS_1: &str = "1.3.6.1.2.1.2.2.1.6.1";

/// Serial-number candidates, most widely supported first.
pub const SERIAL_CANDIDATES: &[&str] = &[
    // ENTITY-MIB entPhysicalSerialNum, chassis entry
    "1.3.6.1.2.1.47.1.1.1.1.11.1",
    // ENTITY-MIB entPhysicalSerialNum, first stack member on Cisco stacks
    "1.3.6.1.2.1.47.1.1.1.1.11.1001",
    // OLD-CISCO-CHASSIS-MIB chassisId
    "1.3.6.1.4.1.9.3.6.3.0",
    // JUNIPER-MIB jnxBoxSerialNo
    "1.3.6.1.4.1.2636.3.1.3.0",
    // HP/Aruba hpHttpMgSerialNumber
    "1.3.6.1.4.1.11.2.36.1.1.2.9.0",
    // Dell chassisServiceTagName
    "1.3.6.1.4.1.674.10892.1.300.10.1.11.1",
];

/// CISCO-CDP-MIB cdpCacheEntry. Suffix: `column.ifIndex.deviceIndex`.
pub const CDP_CACHE_ENTRY: &str = "1.3.6.1.4.1.9.9.23.1.2.1.1";

pub mod cdp_column {
    pub const ADDRESS: u32 = 4;
    pub const VERSION: u32 = 5;
    pub const DEVICE_ID: u32 = 6;
    pub const DEVICE_PORT: u32 = 7;
    pub const PLATFORM: u32 = 8;
}

/// LLDP-MIB lldpRemoteSystemsData, covering both the remote and
/// management-address tables.
pub const LLDP_REMOTE_SYSTEMS: &str = "1.0.8802.1.1.2.1.4";
/// lldpRemPortId. Suffix: `timeMark.localPort.remIndex`.
pub const LLDP_REM_PORT_ID: &str = "1.0.8802.1.1.2.1.4.1.1.7";
/// lldpRemSysName.
pub const LLDP_REM_SYS_NAME: &str = "1.0.8802.1.1.2.1.4.1.1.9";
/// lldpRemSysDesc.
pub const LLDP_REM_SYS_DESC: &str = "1.0.8802.1.1.2.1.4.1.1.10";
/// lldpRemManAddrEntry. Suffix:
/// `column.timeMark.localPort.remIndex.addrSubtype.addrLen.addr...`.
pub const LLDP_REM_MAN_ADDR_ENTRY: &str = "1.0.8802.1.1.2.1.4.2.1";

/// The OIDs sent in one host identity GET, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidSet {
    pub hostname: String,
    pub serial_candidates: Vec<String>,
    pub mac: Option<String>,
    pub description: Option<String>,
}

impl OidSet {
    /// Build the standard set, optionally including MAC and description.
    pub fn standard(collect_mac: bool, collect_description: bool) -> Self {
        Self {
            hostname: SYS_NAME.to_string(),
            serial_candidates: SERIAL_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            mac: collect_mac.then(|| IF_PHYS_ADDRESS_1.to_string()),
            description: collect_description.then(|| SYS_DESCR.to_string()),
        }
    }

    /// Flatten into request order: hostname, serial candidates, MAC, description.
    pub fn request_order(&self) -> Vec<String> {
        let mut oids = Vec::with_capacity(self.serial_candidates.len() + 3);
        oids.push(self.hostname.clone());
        oids.extend(self.serial_candidates.iter().cloned());
        oids.extend(self.mac.iter().cloned());
        oids.extend(self.description.iter().cloned());
        oids
    }

    /// Response position of the MAC OID, if requested.
    pub fn mac_position(&self) -> Option<usize> {
        self.mac.as_ref().map(|_| 1 + self.serial_candidates.len())
    }

    /// Response position of the description OID, if requested.
    pub fn description_position(&self) -> Option<usize> {
        self.description
            .as_ref()
            .map(|_| 1 + self.serial_candidates.len() + usize::from(self.mac.is_some()))
    }
}

/// Return the dotted suffix of `oid` below `root`, if `oid` lies under it.
pub fn suffix_of<'a>(oid: &'a str, root: &str) -> Option<&'a str> {
    oid.strip_prefix(root)?.strip_prefix('.')
}

/// Parse a dotted numeric suffix into its components.
pub fn parse_index(suffix: &str) -> Option<Vec<u32>> {
    suffix.split('.').map(|part| part.parse().ok()).collect()
}
