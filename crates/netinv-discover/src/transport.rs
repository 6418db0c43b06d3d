//! SNMP transport.
//!
//! The engine only needs two operations: a multi-OID GET and a subtree WALK.
//! [`NetSnmpCli`] provides both by running the net-snmp `snmpget` and
//! `snmpwalk` tools under `tokio::process::Command`, so PDU encoding stays
//! outside this crate.

use std::net::Ipv4Addr;
use std::process::Output;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::TransportError;
use crate::response::{self, VarValue, WalkEntry};

/// Extra wall-clock allowance on top of the tool's own timeout budget.
const PROCESS_GRACE: Duration = Duration::from_secs(2);

/// Read-only SNMPv2c operations used by discovery.
#[async_trait]
pub trait SnmpTransport: Send + Sync {
    /// Fetch all `oids` in a single request. The result has one entry per
    /// requested OID, in request order.
    async fn get_many(
        &self,
        address: Ipv4Addr,
        community: &str,
        oids: &[String],
        timeout: Duration,
        retries: u32,
    ) -> Result<Vec<VarValue>, TransportError>;

    /// Walk the subtree rooted at `root` in a single request.
    async fn walk(
        &self,
        address: Ipv4Addr,
        community: &str,
        root: &str,
        timeout: Duration,
        retries: u32,
    ) -> Result<Vec<WalkEntry>, TransportError>;
}

/// Transport backed by the net-snmp command-line tools.
pub struct NetSnmpCli {
    snmpget_path: String,
    snmpwalk_path: String,
}

impl NetSnmpCli {
    pub fn new(snmpget_path: &str, snmpwalk_path: &str) -> Self {
        Self {
            snmpget_path: snmpget_path.to_string(),
            snmpwalk_path: snmpwalk_path.to_string(),
        }
    }

    /// Verify the tools are installed and report the net-snmp version.
    pub async fn verify_installation(&self) -> Result<String, TransportError> {
        let output = Command::new(&self.snmpget_path)
            .arg("--version")
            .output()
            .await
            .map_err(|e| TransportError::Spawn {
                program: self.snmpget_path.clone(),
                reason: e.to_string(),
            })?;

        // net-snmp prints its version banner on stderr.
        let banner = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&banner).trim().to_string())
    }

    async fn run(
        &self,
        program: &str,
        address: Ipv4Addr,
        community: &str,
        timeout: Duration,
        retries: u32,
        oids: &[String],
    ) -> Result<String, TransportError> {
        let secs = timeout.as_secs().max(1);
        let attempts = u64::from(retries.saturating_add(1));
        let budget =
            Duration::from_secs(secs.saturating_mul(attempts)).saturating_add(PROCESS_GRACE);
        let start = Instant::now();

        let mut command = Command::new(program);
        command
            .args(["-v2c", "-c", community])
            .arg("-t")
            .arg(secs.to_string())
            .arg("-r")
            .arg(retries.to_string())
            .args(["-On", "-Oq"])
            .arg(address.to_string())
            .args(oids)
            .kill_on_drop(true);

        let output = match tokio::time::timeout(budget, command.output()).await {
            Ok(result) => result.map_err(|e| TransportError::Spawn {
                program: program.to_string(),
                reason: e.to_string(),
            })?,
            Err(_) => {
                return Err(TransportError::NoResponse {
                    address: address.to_string(),
                })
            }
        };

        tracing::trace!(
            program = %program,
            address = %address,
            elapsed_ms = start.elapsed().as_millis(),
            status = ?output.status.code(),
            "SNMP command finished"
        );

        check_status(program, address, output)
    }
}

fn check_status(
    program: &str,
    address: Ipv4Addr,
    output: Output,
) -> Result<String, TransportError> {
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.contains("Timeout") || stderr.contains("No Response") {
        return Err(TransportError::NoResponse {
            address: address.to_string(),
        });
    }

    // snmpget exits non-zero when some varbinds failed but still prints the rest.
    if !stdout.trim().is_empty() {
        return Ok(stdout);
    }

    Err(TransportError::Failed {
        program: program.to_string(),
        code: output.status.code().unwrap_or(-1),
        stderr,
    })
}

#[async_trait]
impl SnmpTransport for NetSnmpCli {
    async fn get_many(
        &self,
        address: Ipv4Addr,
        community: &str,
        oids: &[String],
        timeout: Duration,
        retries: u32,
    ) -> Result<Vec<VarValue>, TransportError> {
        if oids.is_empty() {
            return Ok(Vec::new());
        }
        let stdout = self
            .run(&self.snmpget_path, address, community, timeout, retries, oids)
            .await?;
        let entries = response::parse_walk_output(&stdout);
        if entries.is_empty() {
            return Err(TransportError::Malformed(format!(
                "{} printed no variables for {address}",
                self.snmpget_path
            )));
        }
        Ok(response::in_request_order(entries, oids))
    }

    async fn walk(
        &self,
        address: Ipv4Addr,
        community: &str,
        root: &str,
        timeout: Duration,
        retries: u32,
    ) -> Result<Vec<WalkEntry>, TransportError> {
        let stdout = self
            .run(
                &self.snmpwalk_path,
                address,
                community,
                timeout,
                retries,
                &[root.to_string()],
            )
            .await?;
        Ok(response::parse_walk_output(&stdout))
    }
}
