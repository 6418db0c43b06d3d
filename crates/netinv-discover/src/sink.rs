//! Result sinks: where discovered records go.
//!
//! The engine hands each successful record to a [`ResultSink`] exactly once.
//! Sinks are shared across concurrent tasks and must accept concurrent
//! appends.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use netinv_core::{HostRecord, NeighborRecord};
use serde::Serialize;

use crate::error::Result;

/// Append-only destination for discovery results.
pub trait ResultSink: Send + Sync {
    fn record_host(&self, host: &HostRecord) -> Result<()>;

    fn record_neighbor(&self, neighbor: &NeighborRecord) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── In-memory ─────────────────────────────────────────────────────

/// Collects records in memory.
#[derive(Default)]
pub struct MemorySink {
    hosts: Mutex<Vec<HostRecord>>,
    neighbors: Mutex<Vec<NeighborRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hosts(&self) -> Vec<HostRecord> {
        lock(&self.hosts).clone()
    }

    pub fn neighbors(&self) -> Vec<NeighborRecord> {
        lock(&self.neighbors).clone()
    }
}

impl ResultSink for MemorySink {
    fn record_host(&self, host: &HostRecord) -> Result<()> {
        lock(&self.hosts).push(host.clone());
        Ok(())
    }

    fn record_neighbor(&self, neighbor: &NeighborRecord) -> Result<()> {
        lock(&self.neighbors).push(neighbor.clone());
        Ok(())
    }
}

// ── JSON lines ────────────────────────────────────────────────────

/// Appends one JSON object per line to a host cache and a neighbor cache.
///
/// Writes are synchronous `std::fs` calls made from worker tasks. Each is a
/// single short line; move them to `spawn_blocking` if records grow.
pub struct JsonLinesSink {
    hosts: Mutex<File>,
    neighbors: Mutex<File>,
}

impl JsonLinesSink {
    /// Open (creating if needed) both cache files for appending.
    pub fn open(host_path: impl AsRef<Path>, neighbor_path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            hosts: Mutex::new(open_append(host_path.as_ref())?),
            neighbors: Mutex::new(open_append(neighbor_path.as_ref())?),
        })
    }
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn append_line<T: Serialize>(file: &Mutex<File>, record: &T) -> Result<()> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    // One write per record keeps lines intact under concurrent appends.
    lock(file).write_all(&line)?;
    Ok(())
}

impl ResultSink for JsonLinesSink {
    fn record_host(&self, host: &HostRecord) -> Result<()> {
        append_line(&self.hosts, host)
    }

    fn record_neighbor(&self, neighbor: &NeighborRecord) -> Result<()> {
        append_line(&self.neighbors, neighbor)
    }
}

/// Read a host cache, keeping the latest record per address.
///
/// Unparseable lines are skipped with a warning. A missing file yields an
/// empty list.
pub fn load_hosts(path: impl AsRef<Path>) -> Result<Vec<HostRecord>> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut latest: HashMap<uuid::Uuid, HostRecord> = HashMap::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HostRecord>(&line) {
            Ok(host) => {
                latest.insert(host.record_id(), host);
            }
            Err(e) => tracing::warn!(
                path = %path.display(),
                line = line_no + 1,
                error = %e,
                "Skipping malformed host cache line"
            ),
        }
    }

    let mut hosts: Vec<HostRecord> = latest.into_values().collect();
    hosts.sort_by_key(|h| h.address);
    Ok(hosts)
}
