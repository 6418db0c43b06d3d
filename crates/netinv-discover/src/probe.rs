//! Host identity probe.
//!
//! Sends one GET per community for the whole [`OidSet`] and stops at the
//! first community whose answer carries a hostname.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use netinv_core::HostRecord;

use crate::error::TransportError;
use crate::oids::OidSet;
use crate::response::{self, VarValue};
use crate::transport::SnmpTransport;

/// Queries a single host for its identity attributes.
#[derive(Clone)]
pub struct SnmpProbe {
    transport: Arc<dyn SnmpTransport>,
    communities: Arc<[String]>,
    oids: Arc<OidSet>,
    request: Arc<[String]>,
    timeout: Duration,
    retries: u32,
}

impl SnmpProbe {
    pub fn new(
        transport: Arc<dyn SnmpTransport>,
        communities: Vec<String>,
        oids: OidSet,
        timeout: Duration,
        retries: u32,
    ) -> Self {
        let request = oids.request_order().into();
        Self {
            transport,
            communities: communities.into(),
            oids: Arc::new(oids),
            request,
            timeout,
            retries,
        }
    }

    /// Query `address` with each community in order.
    ///
    /// Returns `None` when no community produced a hostname, which is the
    /// normal outcome for addresses without an SNMP agent.
    pub async fn query(&self, address: Ipv4Addr) -> Option<HostRecord> {
        for community in self.communities.iter() {
            let values = match self
                .transport
                .get_many(address, community, &self.request, self.timeout, self.retries)
                .await
            {
                Ok(values) => values,
                Err(e) => {
                    log_transport_error(address, &e);
                    continue;
                }
            };

            if let Some(record) = self.extract(address, community, &values) {
                tracing::debug!(
                    address = %address,
                    hostname = %record.hostname,
                    "SNMP identity found"
                );
                return Some(record);
            }

            tracing::debug!(address = %address, "No hostname in SNMP reply, trying next community");
        }

        tracing::debug!(address = %address, "No SNMP answer from any community");
        None
    }

    /// Build a record from one positional reply, or `None` if the hostname
    /// is missing.
    fn extract(
        &self,
        address: Ipv4Addr,
        community: &str,
        values: &[VarValue],
    ) -> Option<HostRecord> {
        let hostname = values
            .first()
            .and_then(VarValue::as_value)
            .filter(|h| !h.is_empty())?
            .to_string();

        let serial_number = values
            .iter()
            .skip(1)
            .take(self.oids.serial_candidates.len())
            .find_map(VarValue::as_value)
            .unwrap_or_default()
            .to_string();

        let mac_address = self
            .oids
            .mac_position()
            .and_then(|pos| values.get(pos))
            .and_then(VarValue::as_value)
            .and_then(response::normalize_mac);

        let description = self
            .oids
            .description_position()
            .and_then(|pos| values.get(pos))
            .and_then(VarValue::as_value)
            .filter(|d| !d.is_empty())
            .map(String::from);

        Some(HostRecord {
            address,
            hostname,
            serial_number,
            mac_address,
            description,
            community: community.to_string(),
            discovered_at: Utc::now(),
        })
    }
}

fn log_transport_error(address: Ipv4Addr, error: &TransportError) {
    if error.is_no_response() {
        tracing::debug!(address = %address, "No SNMP response");
    } else {
        tracing::warn!(address = %address, error = %error, "SNMP transport error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::WalkEntry;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Transport that answers GETs from a per-community table and records
    /// which communities were tried.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: HashMap<String, Vec<VarValue>>,
        tried: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn reply(mut self, community: &str, values: Vec<VarValue>) -> Self {
            self.replies.insert(community.to_string(), values);
            self
        }

        fn tried(&self) -> Vec<String> {
            self.tried.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SnmpTransport for ScriptedTransport {
        async fn get_many(
            &self,
            address: Ipv4Addr,
            community: &str,
            oids: &[String],
            _timeout: Duration,
            _retries: u32,
        ) -> Result<Vec<VarValue>, TransportError> {
            self.tried.lock().unwrap().push(community.to_string());
            match self.replies.get(community) {
                Some(values) => {
                    let mut values = values.clone();
                    values.resize(oids.len(), VarValue::NoSuchInstance);
                    Ok(values)
                }
                None => Err(TransportError::NoResponse {
                    address: address.to_string(),
                }),
            }
        }

        async fn walk(
            &self,
            address: Ipv4Addr,
            _community: &str,
            _root: &str,
            _timeout: Duration,
            _retries: u32,
        ) -> Result<Vec<WalkEntry>, TransportError> {
            Err(TransportError::NoResponse {
                address: address.to_string(),
            })
        }
    }

    fn value(s: &str) -> VarValue {
        VarValue::Value(s.to_string())
    }

    fn oid_set() -> OidSet {
        OidSet {
            hostname: "1.3.6.1.2.1.1.5.0".to_string(),
            serial_candidates: vec!["1.1".to_string(), "1.2".to_string(), "1.3".to_string()],
            mac: Some("1.3.6.1.2.1.2.2.1.6.1".to_string()),
            description: Some("1.3.6.1.2.1.1.1.0".to_string()),
        }
    }

    fn probe(transport: Arc<ScriptedTransport>, communities: &[&str]) -> SnmpProbe {
        SnmpProbe::new(
            transport,
            communities.iter().map(|c| c.to_string()).collect(),
            oid_set(),
            Duration::from_secs(1),
            1,
        )
    }

    const ADDR: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);

    #[tokio::test]
    async fn test_falls_back_and_stops_at_first_success() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .reply("alpha", vec![VarValue::NoSuchObject])
                .reply("bravo", vec![value("sw-b")])
                .reply("charlie", vec![value("sw-c")]),
        );
        let record = probe(transport.clone(), &["alpha", "bravo", "charlie"])
            .query(ADDR)
            .await
            .unwrap();

        assert_eq!(record.hostname, "sw-b");
        assert_eq!(record.community, "bravo");
        assert_eq!(transport.tried(), vec!["alpha", "bravo"]);
    }

    #[tokio::test]
    async fn test_missing_serial_is_still_success() {
        let transport = Arc::new(ScriptedTransport::default().reply(
            "public",
            vec![
                value("edge-1"),
                VarValue::NoSuchInstance,
                VarValue::NoSuchInstance,
                VarValue::NoSuchObject,
            ],
        ));
        let record = probe(transport, &["public"]).query(ADDR).await.unwrap();
        assert_eq!(record.hostname, "edge-1");
        assert_eq!(record.serial_number, "");
        assert!(!record.has_serial());
        assert_eq!(record.mac_address, None);
    }

    #[tokio::test]
    async fn test_first_serial_candidate_wins() {
        let transport = Arc::new(ScriptedTransport::default().reply(
            "public",
            vec![
                value("core-1"),
                VarValue::NoSuchObject,
                value(""),
                value("LATER123"),
                value("00 1B 54 C2 A1 00"),
                value("Cisco IOS"),
            ],
        ));
        let record = probe(transport, &["public"]).query(ADDR).await.unwrap();
        // The empty string from the second candidate wins over the third.
        assert_eq!(record.serial_number, "");
        assert_eq!(record.mac_address.as_deref(), Some("00:1b:54:c2:a1:00"));
        assert_eq!(record.description.as_deref(), Some("Cisco IOS"));
    }

    #[tokio::test]
    async fn test_serial_found() {
        let transport = Arc::new(ScriptedTransport::default().reply(
            "public",
            vec![value("core-1"), VarValue::NoSuchObject, value("FOC1234X0AB")],
        ));
        let record = probe(transport, &["public"]).query(ADDR).await.unwrap();
        assert_eq!(record.serial_number, "FOC1234X0AB");
        assert!(record.has_serial());
    }

    #[tokio::test]
    async fn test_all_communities_exhausted() {
        let transport = Arc::new(
            ScriptedTransport::default().reply("public", vec![value("")]),
        );
        let result = probe(transport.clone(), &["private", "public"]).query(ADDR).await;
        assert!(result.is_none());
        assert_eq!(transport.tried(), vec!["private", "public"]);
    }
}
