//! Typed parsing of net-snmp command output.
//!
//! `snmpget` and `snmpwalk` print one variable per line, either as
//! `OID = TYPE: value` or, with `-Oq`, as `OID value`. Long hex values wrap
//! onto continuation lines, and quoted strings carry embedded newlines
//! verbatim. Quoted payloads are kept byte-exact.
//!
//! This module is the only place that deals with those textual quirks;
//! everything downstream sees [`WalkEntry`] and [`VarValue`].

use std::collections::HashMap;

/// Type tags net-snmp prints before a value in the default output format.
const TYPE_PREFIXES: &[&str] = &[
    "STRING:",
    "Hex-STRING:",
    "INTEGER:",
    "Gauge32:",
    "Counter32:",
    "Counter64:",
    "Timeticks:",
    "OID:",
    "IpAddress:",
    "Network Address:",
    "BITS:",
    "Opaque:",
    "NULL",
];

/// A single response value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarValue {
    Value(String),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl VarValue {
    /// The value text, or `None` for the exception markers.
    pub fn as_value(&self) -> Option<&str> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_exception(&self) -> bool {
        !matches!(self, Self::Value(_))
    }
}

/// One `(oid, value)` pair from a walk. The OID is numeric with no leading dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub oid: String,
    pub value: VarValue,
}

impl WalkEntry {
    pub fn new(oid: impl Into<String>, value: VarValue) -> Self {
        Self {
            oid: normalize_oid(&oid.into()),
            value,
        }
    }
}

/// Parse a single output line. Returns `None` for blank or non-OID lines.
pub fn parse_line(line: &str) -> Option<WalkEntry> {
    let (oid, raw) = split_line(line)?;
    Some(WalkEntry {
        oid: normalize_oid(oid),
        value: parse_value(raw),
    })
}

/// Parse full `snmpwalk` output, joining wrapped continuation lines onto the
/// entry they belong to.
///
/// Inside an open quoted string every line belongs to the string and is
/// joined with `\n`, untrimmed. Outside quotes, continuation lines are hex
/// wraps and are joined with a space.
pub fn parse_walk_output(output: &str) -> Vec<WalkEntry> {
    let mut raw_entries: Vec<(String, String)> = Vec::new();

    for line in output.lines() {
        if let Some((_, raw)) = raw_entries.last_mut() {
            if quote_open(raw) {
                raw.push('\n');
                raw.push_str(line);
                continue;
            }
        }
        if line.trim().is_empty() {
            continue;
        }
        match split_line(line) {
            Some((oid, raw)) => raw_entries.push((normalize_oid(oid), raw.to_string())),
            None => {
                if let Some((_, raw)) = raw_entries.last_mut() {
                    raw.push(' ');
                    raw.push_str(line.trim());
                }
            }
        }
    }

    raw_entries
        .into_iter()
        .map(|(oid, raw)| WalkEntry {
            oid,
            value: parse_value(&raw),
        })
        .collect()
}

/// Parse `snmpget` output into one value per requested OID, in request order.
///
/// OIDs the agent left out of its reply come back as `NoSuchInstance`.
pub fn parse_get_output(output: &str, requested: &[String]) -> Vec<VarValue> {
    in_request_order(parse_walk_output(output), requested)
}

/// Arrange parsed entries by `requested`, filling gaps with `NoSuchInstance`.
pub fn in_request_order(entries: Vec<WalkEntry>, requested: &[String]) -> Vec<VarValue> {
    let mut by_oid: HashMap<String, VarValue> = entries
        .into_iter()
        .map(|entry| (entry.oid, entry.value))
        .collect();

    requested
        .iter()
        .map(|oid| {
            by_oid
                .remove(&normalize_oid(oid))
                .unwrap_or(VarValue::NoSuchInstance)
        })
        .collect()
}

/// Decode a hex octet string as printed by net-snmp.
///
/// Accepts `C0 A8 01 01`, `C0A80101`, `0xC0A80101` and colon-separated
/// forms with single-digit groups such as `0:1b:54:c2:a1:0`.
pub fn decode_hex_octets(raw: &str) -> Option<Vec<u8>> {
    let raw = raw.trim().trim_matches('"').trim();
    let raw = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    if raw.is_empty() {
        return None;
    }

    if raw.contains([' ', ':', '-']) {
        return raw
            .split([' ', ':', '-'])
            .filter(|group| !group.is_empty())
            .map(|group| {
                if group.len() > 2 {
                    return None;
                }
                u8::from_str_radix(group, 16).ok()
            })
            .collect();
    }

    if raw.len() % 2 != 0 || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..raw.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&raw[i..i + 2], 16).ok())
        .collect()
}

/// Normalize a MAC address to lower-case colon form.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let octets = decode_hex_octets(raw)?;
    if octets.len() != 6 {
        return None;
    }
    Some(
        octets
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":"),
    )
}

// Trailing whitespace is kept: it may sit inside a quote that wraps.
fn split_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    if let Some((oid, rest)) = line.split_once(" = ") {
        let oid = oid.trim();
        return looks_like_oid(oid).then_some((oid, strip_type_prefix(rest.trim_start())));
    }

    let (oid, rest) = match line.split_once(char::is_whitespace) {
        Some((oid, rest)) => (oid, rest.trim_start()),
        None => (line, ""),
    };
    looks_like_oid(oid).then_some((oid, rest))
}

fn looks_like_oid(token: &str) -> bool {
    let body = if let Some(rest) = token.strip_prefix("iso.") {
        rest
    } else if let Some(rest) = token.strip_prefix('.') {
        rest
    } else {
        token
    };

    let parts: Vec<&str> = body.split('.').collect();
    parts.len() >= 2
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

fn normalize_oid(oid: &str) -> String {
    let oid = oid.trim();
    if let Some(rest) = oid.strip_prefix("iso.") {
        format!("1.{rest}")
    } else {
        oid.trim_start_matches('.').to_string()
    }
}

fn strip_type_prefix(value: &str) -> &str {
    for prefix in TYPE_PREFIXES {
        if let Some(rest) = value.strip_prefix(prefix) {
            return rest.trim_start();
        }
    }
    value
}

fn parse_value(raw: &str) -> VarValue {
    let raw = raw.trim();
    if raw.starts_with("No Such Object") {
        return VarValue::NoSuchObject;
    }
    if raw.starts_with("No Such Instance") {
        return VarValue::NoSuchInstance;
    }
    if raw.starts_with("No more variables") {
        return VarValue::EndOfMibView;
    }

    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return VarValue::Value(unescape(&raw[1..raw.len() - 1]));
    }
    VarValue::Value(raw.to_string())
}

/// True when `raw` opens a quoted string that has not been closed yet.
fn quote_open(raw: &str) -> bool {
    let Some(body) = raw.strip_prefix('"') else {
        return false;
    };
    let mut escaped = false;
    for c in body.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return false,
            _ => {}
        }
    }
    true
}

/// net-snmp escapes `"` and `\` inside quoted strings with a backslash.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
                continue;
            }
        }
        out.push(c);
    }
    out
}
