//! Discovery orchestration.
//!
//! Two passes share one bounded worker pool:
//! - host discovery: expand specs → optional liveness filter → SNMP identity probe
//! - neighbor discovery: walk CDP/LLDP tables of switch-like hosts
//!
//! No single probe failure aborts a batch. The result is the union of
//! successes, reported as [`BatchOutcome::Exhausted`] when nothing was found.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use netinv_core::{network, HostRecord, NeighborProtocol, NeighborRecord};
use uuid::Uuid;

use crate::config::DiscoverConfig;
use crate::error::{DiscoverError, Result};
use crate::liveness::LivenessProbe;
use crate::neighbors::NeighborDecoder;
use crate::oids::OidSet;
use crate::pool::WorkerPool;
use crate::probe::SnmpProbe;
use crate::sink::ResultSink;
use crate::transport::SnmpTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Hosts,
    Neighbors,
}

/// Counts describing one finished batch.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub kind: BatchKind,
    /// Addresses produced by expansion (hosts) or switches supplied (neighbors).
    pub addresses: usize,
    /// Specs rejected during expansion.
    pub skipped_specs: usize,
    /// Targets actually probed.
    pub candidates: usize,
    /// Hosts that answered, or switches that returned a neighbor table.
    pub succeeded: usize,
    /// Records accepted by the sink.
    pub records: usize,
    pub sink_errors: usize,
    pub duration: Duration,
}

/// How a batch ended. Neither variant is an error.
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Found(BatchSummary),
    /// Ran to completion with zero successes.
    Exhausted(BatchSummary),
}

impl BatchOutcome {
    fn from_summary(summary: BatchSummary) -> Self {
        if summary.succeeded == 0 {
            Self::Exhausted(summary)
        } else {
            Self::Found(summary)
        }
    }

    pub fn summary(&self) -> &BatchSummary {
        match self {
            Self::Found(s) | Self::Exhausted(s) => s,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }
}

/// Default "switch-like" selection: hosts that reported a serial number.
pub fn select_switches(hosts: &[HostRecord]) -> Vec<HostRecord> {
    hosts.iter().filter(|h| h.has_serial()).cloned().collect()
}

/// Drives both discovery passes with an immutable configuration.
pub struct Orchestrator {
    config: Arc<DiscoverConfig>,
    transport: Arc<dyn SnmpTransport>,
    liveness: Option<Arc<dyn LivenessProbe>>,
    pool: WorkerPool,
}

impl Orchestrator {
    /// Validate `config` and build an orchestrator around `transport`.
    pub fn new(config: DiscoverConfig, transport: Arc<dyn SnmpTransport>) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.max_workers);
        Ok(Self {
            config: Arc::new(config),
            transport,
            liveness: None,
            pool,
        })
    }

    /// Attach a liveness probe, used when `liveness_check` is enabled.
    pub fn with_liveness(mut self, probe: Arc<dyn LivenessProbe>) -> Self {
        self.liveness = Some(probe);
        self
    }

    /// Expand `specs`, filter by liveness, and probe every candidate.
    pub async fn discover_hosts<S: AsRef<str>>(
        &self,
        specs: &[S],
        sink: Arc<dyn ResultSink>,
    ) -> Result<BatchOutcome> {
        if specs.is_empty() {
            return Err(DiscoverError::Config("no network specs to scan".to_string()));
        }

        let batch_id = Uuid::new_v4();
        let start = Instant::now();

        let (addresses, mut spec_errors) = network::expand_all(specs);
        if addresses.is_empty() && !spec_errors.is_empty() {
            return Err(spec_errors.remove(0).into());
        }

        tracing::info!(
            batch_id = %batch_id,
            addresses = addresses.len(),
            skipped_specs = spec_errors.len(),
            workers = self.pool.capacity(),
            liveness = self.config.liveness_check,
            "Starting host discovery"
        );

        let expanded = addresses.len();
        let candidates = self.filter_alive(addresses).await;

        tracing::info!(
            batch_id = %batch_id,
            candidates = candidates.len(),
            "Probing candidates over SNMP"
        );

        let probe = SnmpProbe::new(
            self.transport.clone(),
            self.config.communities.clone(),
            OidSet::standard(self.config.collect_mac, self.config.collect_description),
            self.config.snmp_timeout(),
            self.config.snmp_retries,
        );

        let outcomes = self
            .pool
            .run(candidates.iter().copied(), |address| {
                let probe = probe.clone();
                let sink = Arc::clone(&sink);
                async move {
                    let host = probe.query(address).await?;
                    let stored = sink.record_host(&host);
                    if let Err(e) = &stored {
                        tracing::error!(
                            address = %address,
                            error = %e,
                            "Failed to store host record"
                        );
                    }
                    Some(stored.is_ok())
                }
            })
            .await;

        let succeeded = outcomes.iter().flatten().count();
        let records = outcomes.iter().flatten().filter(|stored| **stored).count();

        let summary = BatchSummary {
            batch_id,
            kind: BatchKind::Hosts,
            addresses: expanded,
            skipped_specs: spec_errors.len(),
            candidates: candidates.len(),
            succeeded,
            records,
            sink_errors: succeeded - records,
            duration: start.elapsed(),
        };

        tracing::info!(
            batch_id = %batch_id,
            candidates = summary.candidates,
            found = summary.succeeded,
            stored = summary.records,
            duration_ms = summary.duration.as_millis(),
            "Host discovery complete"
        );

        Ok(BatchOutcome::from_summary(summary))
    }

    /// Walk the neighbor tables of `switches`.
    ///
    /// For each switch, protocols are tried in configured order and, within
    /// a protocol, communities in configured order. The first non-empty
    /// table wins.
    pub async fn discover_neighbors(
        &self,
        switches: &[HostRecord],
        sink: Arc<dyn ResultSink>,
    ) -> Result<BatchOutcome> {
        let batch_id = Uuid::new_v4();
        let start = Instant::now();

        let targets: BTreeSet<Ipv4Addr> = switches.iter().map(|h| h.address).collect();

        tracing::info!(
            batch_id = %batch_id,
            switches = targets.len(),
            protocols = ?self.config.protocols,
            workers = self.pool.capacity(),
            "Starting neighbor discovery"
        );

        let decoder = NeighborDecoder::new(
            self.transport.clone(),
            self.config.walk_timeout(),
            self.config.snmp_retries,
        );
        let protocols: Arc<[NeighborProtocol]> = self.config.protocols.clone().into();
        let communities: Arc<[String]> = self.config.communities.clone().into();

        let outcomes = self
            .pool
            .run(targets.iter().copied(), |switch| {
                let decoder = decoder.clone();
                let protocols = Arc::clone(&protocols);
                let communities = Arc::clone(&communities);
                let sink = Arc::clone(&sink);
                async move {
                    let (protocol, neighbors) =
                        first_table(&decoder, switch, &protocols, &communities).await?;

                    let stored = neighbors
                        .iter()
                        .filter(|n| match sink.record_neighbor(n) {
                            Ok(()) => true,
                            Err(e) => {
                                tracing::error!(
                                    switch = %switch,
                                    error = %e,
                                    "Failed to store neighbor record"
                                );
                                false
                            }
                        })
                        .count();

                    tracing::info!(
                        switch = %switch,
                        protocol = %protocol,
                        neighbors = neighbors.len(),
                        "Neighbor table captured"
                    );
                    Some((neighbors.len(), stored))
                }
            })
            .await;

        let found: Vec<(usize, usize)> = outcomes.into_iter().flatten().collect();
        let total: usize = found.iter().map(|(total, _)| total).sum();
        let records: usize = found.iter().map(|(_, stored)| stored).sum();

        let summary = BatchSummary {
            batch_id,
            kind: BatchKind::Neighbors,
            addresses: switches.len(),
            skipped_specs: 0,
            candidates: targets.len(),
            succeeded: found.len(),
            records,
            sink_errors: total - records,
            duration: start.elapsed(),
        };

        tracing::info!(
            batch_id = %batch_id,
            switches = summary.candidates,
            answered = summary.succeeded,
            stored = summary.records,
            duration_ms = summary.duration.as_millis(),
            "Neighbor discovery complete"
        );

        Ok(BatchOutcome::from_summary(summary))
    }

    /// Keep addresses that answer the liveness probe, or all of them when
    /// the check is disabled, no probe is attached, or the probe cannot run.
    async fn filter_alive(&self, addresses: Vec<Ipv4Addr>) -> Vec<Ipv4Addr> {
        if !self.config.liveness_check {
            return addresses;
        }
        let Some(probe) = &self.liveness else {
            tracing::warn!("Liveness check enabled but no probe attached; probing every address");
            return addresses;
        };
        if let Err(e) = probe.verify_installation().await {
            tracing::warn!(error = %e, "Liveness probe unusable; probing every address");
            return addresses;
        }

        let timeout = self.config.liveness_timeout();
        let mut alive: Vec<Ipv4Addr> = self
            .pool
            .run(addresses, |address| {
                let probe = Arc::clone(probe);
                async move { probe.is_alive(address, timeout).await.then_some(address) }
            })
            .await
            .into_iter()
            .flatten()
            .collect();
        alive.sort_unstable();
        alive
    }
}

async fn first_table(
    decoder: &NeighborDecoder,
    switch: Ipv4Addr,
    protocols: &[NeighborProtocol],
    communities: &[String],
) -> Option<(NeighborProtocol, Vec<NeighborRecord>)> {
    for &protocol in protocols {
        for community in communities {
            if let Some(neighbors) = decoder.decode(switch, community, protocol).await {
                return Some((protocol, neighbors));
            }
        }
        tracing::debug!(
            switch = %switch,
            protocol = %protocol,
            "No neighbor table, trying next protocol"
        );
    }
    None
}
