//! Error types for the netinv-discover crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error(transparent)]
    InvalidSpec(#[from] netinv_core::CoreError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures reported by an SNMP transport.
///
/// `NoResponse` is the ordinary outcome for an address with no agent or a
/// wrong community; the other variants indicate something actually broke.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("No response from {address}")]
    NoResponse { address: String },

    #[error("Failed to launch {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("{program} exited with code {code}: {stderr}")]
    Failed {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    pub fn is_no_response(&self) -> bool {
        matches!(self, Self::NoResponse { .. })
    }
}

pub type Result<T> = std::result::Result<T, DiscoverError>;
