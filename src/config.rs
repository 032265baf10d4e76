//! Client configuration (§6). Grounded on `data_connector/src/config.rs`'s
//! style of explicit, validated config structs (serde-derived, defaulted
//! fields, a `build`/constructor that returns `Result`).

use crate::error::{DoraError, DoraResult};
use crate::registry::RegistryCredentials;

pub const DEFAULT_CLUSTER_NAME: &str = "DefaultAlluxioCluster";
pub const DEFAULT_ETCD_PORT: u16 = 2379;
pub const DEFAULT_WORKER_HTTP_PORT: u16 = 28080;
pub const DEFAULT_PAGE_SIZE: &str = "1MB";
pub const DEFAULT_HASH_NODE_PER_WORKER: u32 = 5;
pub const DEFAULT_CONCURRENCY: usize = 64;
pub const DEFAULT_ETCD_REFRESH_INTERVAL_SECS: i64 = 120;

/// Where the client sources worker membership from. Mutually exclusive by
/// construction (`DoraClientConfig::builder` rejects supplying both).
#[derive(Debug, Clone)]
pub enum MembershipSource {
    Static { worker_hosts: Vec<String> },
    Registry {
        etcd_hosts: Vec<String>,
        etcd_port: u16,
        credentials: Option<RegistryCredentials>,
        refresh_interval_secs: i64,
    },
}

#[derive(Debug, Clone)]
pub struct DoraClientConfig {
    pub membership: MembershipSource,
    pub cluster_name: String,
    pub worker_http_port: u16,
    pub page_size: u64,
    pub hash_node_per_worker: u32,
    pub concurrency: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DoraClientConfigBuilder {
    etcd_hosts: Option<Vec<String>>,
    worker_hosts: Option<Vec<String>>,
    etcd_port: Option<u16>,
    etcd_username: Option<String>,
    etcd_password: Option<String>,
    cluster_name: Option<String>,
    worker_http_port: Option<u16>,
    page_size: Option<String>,
    hash_node_per_worker: Option<u32>,
    concurrency: Option<usize>,
    etcd_refresh_workers_interval: Option<i64>,
}

impl DoraClientConfigBuilder {
    pub fn etcd_hosts(mut self, hosts: impl Into<String>) -> Self {
        self.etcd_hosts = Some(split_hosts(&hosts.into()));
        self
    }

    pub fn worker_hosts(mut self, hosts: impl Into<String>) -> Self {
        self.worker_hosts = Some(split_hosts(&hosts.into()));
        self
    }

    pub fn etcd_port(mut self, port: u16) -> Self {
        self.etcd_port = Some(port);
        self
    }

    pub fn etcd_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.etcd_username = Some(user.into());
        self.etcd_password = Some(password.into());
        self
    }

    pub fn cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = Some(name.into());
        self
    }

    pub fn worker_http_port(mut self, port: u16) -> Self {
        self.worker_http_port = Some(port);
        self
    }

    pub fn page_size(mut self, size: impl Into<String>) -> Self {
        self.page_size = Some(size.into());
        self
    }

    pub fn hash_node_per_worker(mut self, n: u32) -> Self {
        self.hash_node_per_worker = Some(n);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = Some(n);
        self
    }

    pub fn etcd_refresh_workers_interval(mut self, secs: i64) -> Self {
        self.etcd_refresh_workers_interval = Some(secs);
        self
    }

    pub fn build(self) -> DoraResult<DoraClientConfig> {
        let membership = match (&self.etcd_hosts, &self.worker_hosts) {
            (Some(_), Some(_)) => {
                return Err(DoraError::Config(
                    "supply either 'etcd_hosts' or 'worker_hosts', not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(DoraError::Config(
                    "must supply either 'etcd_hosts' or 'worker_hosts'".to_string(),
                ))
            }
            (Some(hosts), None) => {
                let etcd_port = self.etcd_port.unwrap_or(DEFAULT_ETCD_PORT);
                if !(1..=65535).contains(&etcd_port) {
                    return Err(DoraError::Config(
                        "'etcd_port' must be in range 1-65535".to_string(),
                    ));
                }
                let credentials = match (&self.etcd_username, &self.etcd_password) {
                    (Some(user), Some(password)) => Some(RegistryCredentials {
                        user: user.clone(),
                        password: password.clone(),
                    }),
                    (None, None) => None,
                    _ => {
                        return Err(DoraError::Config(
                            "both 'etcd_username' and 'etcd_password' must be set, or neither"
                                .to_string(),
                        ))
                    }
                };
                let refresh = self
                    .etcd_refresh_workers_interval
                    .unwrap_or(DEFAULT_ETCD_REFRESH_INTERVAL_SECS);
                MembershipSource::Registry {
                    etcd_hosts: hosts.clone(),
                    etcd_port,
                    credentials,
                    refresh_interval_secs: refresh,
                }
            }
            (None, Some(hosts)) => MembershipSource::Static {
                worker_hosts: hosts.clone(),
            },
        };

        let worker_http_port = self.worker_http_port.unwrap_or(DEFAULT_WORKER_HTTP_PORT);
        if !(1..=65535).contains(&worker_http_port) {
            return Err(DoraError::Config(
                "'worker_http_port' must be in range 1-65535".to_string(),
            ));
        }

        let concurrency = self.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(DoraError::Config(
                "'concurrency' must be a positive integer".to_string(),
            ));
        }

        let hash_node_per_worker = self
            .hash_node_per_worker
            .unwrap_or(DEFAULT_HASH_NODE_PER_WORKER);
        if hash_node_per_worker == 0 {
            return Err(DoraError::Config(
                "'hash_node_per_worker' must be a positive integer".to_string(),
            ));
        }

        let page_size_str = self.page_size.unwrap_or_else(|| DEFAULT_PAGE_SIZE.to_string());
        let page_size = parse_binary_size(&page_size_str)
            .ok_or_else(|| DoraError::Config(format!("invalid 'page_size' {page_size_str:?}")))?;

        Ok(DoraClientConfig {
            membership,
            cluster_name: self.cluster_name.unwrap_or_else(|| DEFAULT_CLUSTER_NAME.to_string()),
            worker_http_port,
            page_size,
            hash_node_per_worker,
            concurrency,
        })
    }
}

impl DoraClientConfig {
    pub fn builder() -> DoraClientConfigBuilder {
        DoraClientConfigBuilder::default()
    }
}

fn split_hosts(s: &str) -> Vec<String> {
    s.split(',').map(|h| h.trim().to_string()).filter(|h| !h.is_empty()).collect()
}

/// Parses a human-readable size always in binary units (1 KB == 1024 bytes),
/// matching `humanfriendly.parse_size(page_size, binary=True)` in the
/// original Python client. A general-purpose size-parsing crate is
/// deliberately not used here: most such crates treat "KB"/"MB" as
/// decimal (1000-based) by default, which would silently change the byte
/// math in §4.5's page-boundary arithmetic.
fn parse_binary_size(s: &str) -> Option<u64> {
    let s = s.trim();
    let digits_end = s.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(s.len());
    let (number, unit) = s.split_at(digits_end);
    let number: f64 = number.parse().ok()?;
    let unit = unit.trim().to_ascii_uppercase();
    let multiplier: u64 = match unit.as_str() {
        "" | "B" => 1,
        "KB" | "K" | "KIB" => 1024,
        "MB" | "M" | "MIB" => 1024 * 1024,
        "GB" | "G" | "GIB" => 1024 * 1024 * 1024,
        "TB" | "T" | "TIB" => 1024 * 1024 * 1024 * 1024,
        _ => return None,
    };
    Some((number * multiplier as f64).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_both_sources() {
        let err = DoraClientConfig::builder()
            .etcd_hosts("h1:2379")
            .worker_hosts("w1")
            .build()
            .unwrap_err();
        assert!(matches!(err, DoraError::Config(_)));
    }

    #[test]
    fn rejects_neither_source() {
        assert!(DoraClientConfig::builder().build().is_err());
    }

    #[test]
    fn rejects_unpaired_credentials() {
        let mut builder = DoraClientConfig::builder().etcd_hosts("h1");
        builder.etcd_username = Some("u".to_string());
        assert!(builder.build().is_err());
    }

    #[test]
    fn parses_human_readable_page_size() {
        let cfg = DoraClientConfig::builder()
            .worker_hosts("h1")
            .page_size("4KB")
            .build()
            .unwrap();
        assert_eq!(cfg.page_size, 4096);
    }

    #[test]
    fn default_page_size_is_one_mebibyte() {
        let cfg = DoraClientConfig::builder().worker_hosts("h1").build().unwrap();
        assert_eq!(cfg.page_size, 1024 * 1024);
    }

    #[test]
    fn defaults_match_spec() {
        let cfg = DoraClientConfig::builder().worker_hosts("h1,h2").build().unwrap();
        assert_eq!(cfg.cluster_name, DEFAULT_CLUSTER_NAME);
        assert_eq!(cfg.worker_http_port, DEFAULT_WORKER_HTTP_PORT);
        assert_eq!(cfg.hash_node_per_worker, DEFAULT_HASH_NODE_PER_WORKER);
        assert_eq!(cfg.concurrency, DEFAULT_CONCURRENCY);
    }
}
