//! Registry client (C2): fetches the live worker set from a
//! strongly-consistent KV registry keyed by `"/ServiceDiscovery/<cluster>/"`.
//!
//! Grounded on `original_source/alluxio/worker_ring.py` (`EtcdClient`):
//! random host permutation, prefix range fetch, per-value JSON decode via
//! `WorkerEntity::from_registry_value`. The registry is addressed through
//! etcd's v3 gRPC-gateway HTTP API (`/v3/kv/range`) rather than a native
//! etcd client crate, since none of the teacher's workspace dependencies
//! include one and `reqwest` is already the crate's HTTP stack (see
//! `SPEC_FULL.md` §4.1).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::error::{DoraError, DoraResult};
use crate::worker::WorkerEntity;

const DEFAULT_ETCD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct RegistryCredentials {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    hosts: Vec<String>,
    port: u16,
    prefix: String,
    credentials: Option<RegistryCredentials>,
}

#[derive(Debug, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<Kv>,
}

#[derive(Debug, Deserialize)]
struct Kv {
    #[serde(default)]
    value: String,
}

impl RegistryClient {
    pub fn new(
        hosts: Vec<String>,
        port: u16,
        cluster_name: &str,
        credentials: Option<RegistryCredentials>,
    ) -> DoraResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_ETCD_TIMEOUT)
            .build()
            .map_err(|e| DoraError::Transport(format!("build registry HTTP client: {e}")))?;
        Ok(Self {
            http,
            hosts,
            port,
            prefix: format!("/ServiceDiscovery/{cluster_name}/"),
            credentials,
        })
    }

    /// Fetches the current worker set, trying endpoints in a random
    /// permutation of the configured hosts until one succeeds (§4.1).
    pub async fn fetch(&self) -> DoraResult<HashSet<WorkerEntity>> {
        let mut hosts = self.hosts.clone();
        hosts.shuffle(&mut rand::rng());

        // Each endpoint is tried in turn; an empty-but-reachable response
        // still counts as "tried" but keeps looking at remaining hosts,
        // matching the original client's retry-on-any-exception loop.
        let mut any_reachable = false;
        for host in &hosts {
            match self.fetch_from(host).await {
                Ok(entities) if !entities.is_empty() => return Ok(entities),
                Ok(_) => any_reachable = true,
                Err(e) => {
                    tracing::debug!(host = %host, error = %e, "registry endpoint unreachable");
                }
            }
        }
        if any_reachable {
            Err(DoraError::RegistryEmpty {
                prefix: self.prefix.clone(),
            })
        } else {
            Err(DoraError::RegistryUnavailable {
                hosts: self.hosts.clone(),
            })
        }
    }

    async fn fetch_from(&self, host: &str) -> DoraResult<HashSet<WorkerEntity>> {
        let url = format!("http://{host}:{}/v3/kv/range", self.port);
        let range_end = prefix_range_end(self.prefix.as_bytes());
        let body = serde_json::json!({
            "key": STANDARD.encode(self.prefix.as_bytes()),
            "range_end": STANDARD.encode(range_end),
        });

        let mut request = self.http.post(&url).json(&body);
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.user, Some(&creds.password));
        }

        let response = request.send().await?.error_for_status()?;
        let parsed: RangeResponse = response.json().await?;

        parsed
            .kvs
            .iter()
            .map(|kv| {
                let bytes = STANDARD
                    .decode(&kv.value)
                    .map_err(|e| DoraError::WorkerInfoParse(format!("bad base64 value: {e}")))?;
                WorkerEntity::from_registry_value(&bytes)
            })
            .collect()
    }
}

/// Computes etcd's `range_end` for a prefix scan: increment the last byte
/// that isn't `0xff`, dropping any trailing `0xff` bytes. An all-`0xff`
/// prefix scans to the end of the keyspace (`range_end = "\0"`).
fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(&last) = end.last() {
        if last == 0xff {
            end.pop();
        } else {
            *end.last_mut().unwrap() += 1;
            return end;
        }
    }
    vec![0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_range_end_increments_last_byte() {
        assert_eq!(prefix_range_end(b"abc"), b"abd".to_vec());
    }

    #[test]
    fn prefix_range_end_drops_trailing_0xff() {
        assert_eq!(prefix_range_end(&[0x61, 0xff]), vec![0x62]);
    }

    #[test]
    fn prefix_range_end_of_all_0xff_is_zero_byte() {
        assert_eq!(prefix_range_end(&[0xff, 0xff]), vec![0]);
    }
}
