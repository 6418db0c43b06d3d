//! netinv-discover: Concurrent SNMP inventory and topology discovery.
//!
//! Expands network specs, probes hosts over SNMP with community fallback,
//! and walks CDP/LLDP neighbor tables of switches, all under a bounded
//! worker pool. Results stream to a pluggable sink.

pub mod config;
pub mod error;
pub mod liveness;
pub mod neighbors;
pub mod oids;
pub mod orchestrator;
pub mod pool;
pub mod probe;
pub mod response;
pub mod sink;
pub mod transport;

pub use error::{DiscoverError, TransportError};
pub use orchestrator::{BatchOutcome, BatchSummary, Orchestrator};
