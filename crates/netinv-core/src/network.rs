//! Network specification parsing and address expansion.
//!
//! Three spec shapes are accepted:
//! - a single address: `10.0.1.7`
//! - an inclusive last-octet range: `10.0.1.10-40`
//! - a /24 subnet: `10.0.1.0/24` (expands to `.1` through `.254`)
//!
//! Only /24 masks are supported. Wider or narrower masks are rejected rather
//! than approximated.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;

use crate::error::CoreError;

/// Highest last octet produced by a range or subnet expansion.
const MAX_HOST_OCTET: u16 = 254;

/// A parsed network specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkSpec {
    Single(Ipv4Addr),
    Range { base: [u8; 3], start: u8, end: u8 },
    Subnet24 { base: [u8; 3] },
}

impl NetworkSpec {
    /// Iterate the addresses covered by this spec in ascending order.
    ///
    /// The iterator borrows nothing, so callers can count and re-walk freely.
    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> {
        let (base, start, end) = self.span();
        (start..=end).map(move |last| Ipv4Addr::new(base[0], base[1], base[2], last))
    }

    /// Number of addresses covered.
    pub fn len(&self) -> usize {
        let (_, start, end) = self.span();
        usize::from(end - start) + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    fn span(&self) -> ([u8; 3], u8, u8) {
        match *self {
            Self::Single(addr) => {
                let [a, b, c, d] = addr.octets();
                ([a, b, c], d, d)
            }
            Self::Range { base, start, end } => (base, start, end),
            Self::Subnet24 { base } => (base, 1, MAX_HOST_OCTET as u8),
        }
    }
}

impl fmt::Display for NetworkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(addr) => write!(f, "{addr}"),
            Self::Range { base, start, end } => {
                write!(f, "{}.{}.{}.{start}-{end}", base[0], base[1], base[2])
            }
            Self::Subnet24 { base } => write!(f, "{}.{}.{}.0/24", base[0], base[1], base[2]),
        }
    }
}

impl FromStr for NetworkSpec {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();
        if spec.is_empty() {
            return Err(CoreError::invalid_spec(s, "empty spec"));
        }

        if spec.contains('/') {
            parse_subnet(spec)
        } else if spec.contains('-') {
            parse_range(spec)
        } else {
            parse_single(spec).map(Self::Single)
        }
    }
}

/// Expand a single spec string into its addresses.
pub fn expand(spec: &str) -> Result<Vec<Ipv4Addr>, CoreError> {
    let parsed: NetworkSpec = spec.parse()?;
    Ok(parsed.addresses().collect())
}

/// Expand several specs, concatenating in input order.
///
/// A malformed spec is returned in the error list and skipped; the
/// remaining specs still expand.
pub fn expand_all<S: AsRef<str>>(specs: &[S]) -> (Vec<Ipv4Addr>, Vec<CoreError>) {
    let mut addresses = Vec::new();
    let mut errors = Vec::new();

    for spec in specs {
        match expand(spec.as_ref()) {
            Ok(mut expanded) => addresses.append(&mut expanded),
            Err(e) => {
                tracing::warn!(spec = %spec.as_ref(), error = %e, "Skipping invalid network spec");
                errors.push(e);
            }
        }
    }

    (addresses, errors)
}

fn parse_single(spec: &str) -> Result<Ipv4Addr, CoreError> {
    let groups: Vec<&str> = spec.split('.').collect();
    let well_formed = groups.len() == 4
        && groups
            .iter()
            .all(|g| (1..=3).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit()));
    if !well_formed {
        return Err(CoreError::invalid_spec(
            spec,
            "expected an address, a range like A.B.C.1-254, or a /24 subnet",
        ));
    }

    spec.parse::<Ipv4Addr>()
        .map_err(|e| CoreError::invalid_spec(spec, e.to_string()))
}

fn parse_range(spec: &str) -> Result<NetworkSpec, CoreError> {
    let (head, end) = spec
        .split_once('-')
        .ok_or_else(|| CoreError::invalid_spec(spec, "missing range end"))?;
    let (prefix, start) = head
        .rsplit_once('.')
        .ok_or_else(|| CoreError::invalid_spec(spec, "missing range start"))?;

    let base = parse_base(spec, prefix)?;
    let start = parse_octet_bound(spec, start, "start")?;
    let end = parse_octet_bound(spec, end, "end")?;

    if start == 0 {
        return Err(CoreError::invalid_spec(spec, "range start must be at least 1"));
    }
    if end > MAX_HOST_OCTET {
        return Err(CoreError::invalid_spec(
            spec,
            format!("range end {end} exceeds {MAX_HOST_OCTET}"),
        ));
    }
    if start > end {
        return Err(CoreError::invalid_spec(
            spec,
            format!("range start {start} is greater than end {end}"),
        ));
    }

    Ok(NetworkSpec::Range {
        base,
        start: start as u8,
        end: end as u8,
    })
}

fn parse_subnet(spec: &str) -> Result<NetworkSpec, CoreError> {
    let net: Ipv4Net = spec
        .parse()
        .map_err(|e: ipnet::AddrParseError| CoreError::invalid_spec(spec, e.to_string()))?;

    if net.prefix_len() != 24 {
        return Err(CoreError::invalid_spec(
            spec,
            format!("unsupported mask /{} (only /24 is supported)", net.prefix_len()),
        ));
    }

    let [a, b, c, _] = net.network().octets();
    Ok(NetworkSpec::Subnet24 { base: [a, b, c] })
}

fn parse_base(spec: &str, prefix: &str) -> Result<[u8; 3], CoreError> {
    let octets: Vec<&str> = prefix.split('.').collect();
    if octets.len() != 3 {
        return Err(CoreError::invalid_spec(spec, "range prefix must have three octets"));
    }

    let mut base = [0u8; 3];
    for (slot, octet) in base.iter_mut().zip(&octets) {
        if octet.is_empty() || octet.len() > 3 || !octet.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::invalid_spec(spec, format!("bad octet '{octet}'")));
        }
        *slot = octet
            .parse()
            .map_err(|_| CoreError::invalid_spec(spec, format!("octet '{octet}' out of range")))?;
    }
    Ok(base)
}

fn parse_octet_bound(spec: &str, raw: &str, which: &str) -> Result<u16, CoreError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.len() > 3 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::invalid_spec(
            spec,
            format!("range {which} '{raw}' is not a non-negative integer"),
        ));
    }
    raw.parse()
        .map_err(|_| CoreError::invalid_spec(spec, format!("range {which} '{raw}' is invalid")))
}
