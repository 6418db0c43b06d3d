//! netinv-core: Shared records and network parsing for the netinv scanner.
//!
//! This crate provides the types used across netinv components:
//! - Host and neighbor records handed to result sinks
//! - Network specification parsing and address expansion
//! - Common error types

pub mod error;
pub mod network;
pub mod types;

pub use error::CoreError;
pub use network::{expand, expand_all, NetworkSpec};
pub use types::{HostRecord, NeighborProtocol, NeighborRecord, UNKNOWN_ADDRESS};
