//! Reachability checks run before SNMP is attempted.

use std::net::Ipv4Addr;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::TransportError;

/// A cheap "is anything there" check.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_alive(&self, address: Ipv4Addr, timeout: Duration) -> bool;

    /// Check the probe can run at all. A probe that fails here would report
    /// every host as dead, so callers skip liveness filtering instead.
    async fn verify_installation(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// ICMP echo via the system `ping` binary.
pub struct PingProbe {
    ping_path: String,
}

impl PingProbe {
    pub fn new(ping_path: &str) -> Self {
        Self {
            ping_path: ping_path.to_string(),
        }
    }
}

#[async_trait]
impl LivenessProbe for PingProbe {
    /// Ping loopback once. Catches a missing binary and refused ICMP sockets.
    async fn verify_installation(&self) -> Result<(), TransportError> {
        let output = Command::new(&self.ping_path)
            .args(["-c", "1", "-W", "1"])
            .arg(Ipv4Addr::LOCALHOST.to_string())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(Duration::from_secs(3), output)
            .await
            .map_err(|_| TransportError::NoResponse {
                address: Ipv4Addr::LOCALHOST.to_string(),
            })?
            .map_err(|e| TransportError::Spawn {
                program: self.ping_path.clone(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            return Ok(());
        }
        Err(TransportError::Failed {
            program: self.ping_path.clone(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    async fn is_alive(&self, address: Ipv4Addr, timeout: Duration) -> bool {
        // `ping -W` takes whole seconds on Linux.
        let wait_secs = timeout.as_secs_f64().ceil().max(1.0) as u64;

        let status = Command::new(&self.ping_path)
            .args(["-c", "1", "-W"])
            .arg(wait_secs.to_string())
            .arg(address.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(timeout + Duration::from_secs(1), status).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                tracing::warn!(address = %address, error = %e, "Failed to run ping");
                false
            }
            Err(_) => false,
        }
    }
}
