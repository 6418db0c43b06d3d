use thiserror::Error;

/// Errors raised by the shared netinv types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid network spec '{spec}': {reason}")]
    InvalidNetworkSpec { spec: String, reason: String },

    #[error("Unknown discovery protocol: {0}")]
    UnknownProtocol(String),
}

impl CoreError {
    pub(crate) fn invalid_spec(spec: &str, reason: impl Into<String>) -> Self {
        Self::InvalidNetworkSpec {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}
