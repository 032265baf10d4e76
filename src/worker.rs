//! Worker identity, network address, and entity value types.
//!
//! Grounded on `original_source/alluxio/worker_ring.py` (`WorkerIdentity`,
//! `WorkerNetAddress`, `WorkerEntity`), expressed as immutable Rust value
//! types per `SPEC_FULL.md` §3.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DoraError, DoraResult};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_RPC_PORT: u16 = 29999;
pub const DEFAULT_DATA_PORT: u16 = 29997;
pub const DEFAULT_SECURE_RPC_PORT: u16 = 0;
pub const DEFAULT_NETTY_DATA_PORT: u16 = 29997;
pub const DEFAULT_WEB_PORT: u16 = 30000;
pub const DEFAULT_WORKER_HTTP_SERVER_PORT: u16 = 28080;
pub const DEFAULT_WORKER_IDENTIFIER_VERSION: u32 = 1;

/// Immutable pair of a version and a 16-byte opaque identifier.
///
/// When synthesized from a hostname, `identifier` is a UUIDv3 digest over
/// the null namespace with the hostname as name (matches
/// `WorkerEntity.from_host_and_port` in the original Python client).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerIdentity {
    pub version: u32,
    pub identifier: [u8; 16],
}

impl WorkerIdentity {
    pub fn new(version: u32, identifier: [u8; 16]) -> Self {
        Self { version, identifier }
    }

    pub fn from_hostname(host: &str) -> Self {
        let uuid = Uuid::new_v3(&Uuid::nil(), host.as_bytes());
        Self {
            version: DEFAULT_WORKER_IDENTIFIER_VERSION,
            identifier: *uuid.as_bytes(),
        }
    }
}

/// Network-reachability record for a worker. Only `host` and
/// `http_server_port` are load-bearing for this crate; the rest flow
/// through unchanged for other collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerNetAddress {
    #[serde(default = "default_host", rename = "Host")]
    pub host: String,
    #[serde(default, rename = "ContainerHost")]
    pub container_host: String,
    #[serde(default = "default_rpc_port", rename = "RpcPort")]
    pub rpc_port: u16,
    #[serde(default = "default_data_port", rename = "DataPort")]
    pub data_port: u16,
    #[serde(default = "default_secure_rpc_port", rename = "SecureRpcPort")]
    pub secure_rpc_port: u16,
    #[serde(default = "default_netty_data_port", rename = "NettyDataPort")]
    pub netty_data_port: u16,
    #[serde(default = "default_web_port", rename = "WebPort")]
    pub web_port: u16,
    #[serde(default, rename = "DomainSocketPath")]
    pub domain_socket_path: String,
    #[serde(default = "default_http_port", rename = "HttpServerPort")]
    pub http_server_port: u16,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_rpc_port() -> u16 {
    DEFAULT_RPC_PORT
}
fn default_data_port() -> u16 {
    DEFAULT_DATA_PORT
}
fn default_secure_rpc_port() -> u16 {
    DEFAULT_SECURE_RPC_PORT
}
fn default_netty_data_port() -> u16 {
    DEFAULT_NETTY_DATA_PORT
}
fn default_web_port() -> u16 {
    DEFAULT_WEB_PORT
}
fn default_http_port() -> u16 {
    DEFAULT_WORKER_HTTP_SERVER_PORT
}

impl Default for WorkerNetAddress {
    fn default() -> Self {
        Self {
            host: default_host(),
            container_host: String::new(),
            rpc_port: DEFAULT_RPC_PORT,
            data_port: DEFAULT_DATA_PORT,
            secure_rpc_port: DEFAULT_SECURE_RPC_PORT,
            netty_data_port: DEFAULT_NETTY_DATA_PORT,
            web_port: DEFAULT_WEB_PORT,
            domain_socket_path: String::new(),
            http_server_port: DEFAULT_WORKER_HTTP_SERVER_PORT,
        }
    }
}

impl WorkerNetAddress {
    pub fn from_host(host: impl Into<String>, http_server_port: u16) -> Self {
        Self {
            host: host.into(),
            http_server_port,
            ..Default::default()
        }
    }
}

/// Immutable pair of identity + address. Two entities are equal iff both
/// fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerEntity {
    pub identity: WorkerIdentity,
    pub address: WorkerNetAddress,
}

impl std::hash::Hash for WorkerNetAddress {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.http_server_port.hash(state);
    }
}

impl Eq for WorkerNetAddress {}

#[derive(Debug, Deserialize)]
struct IdentityWire {
    version: u32,
    identifier: String,
}

#[derive(Debug, Deserialize)]
struct WorkerInfoWire {
    #[serde(rename = "Identity")]
    identity: IdentityWire,
    #[serde(rename = "WorkerNetAddress", default)]
    address: WorkerNetAddress,
}

impl WorkerEntity {
    /// Decode a registry value as produced by `ETCD_PREFIX_FORMAT` entries:
    /// a JSON document with `Identity` and `WorkerNetAddress` top-level
    /// fields (§4.1). Unknown fields are ignored; missing ones default.
    pub fn from_registry_value(bytes: &[u8]) -> DoraResult<Self> {
        let wire: WorkerInfoWire = serde_json::from_slice(bytes)
            .map_err(|e| DoraError::WorkerInfoParse(e.to_string()))?;
        let identifier_bytes = hex::decode(&wire.identity.identifier)
            .map_err(|e| DoraError::WorkerInfoParse(format!("bad identifier hex: {e}")))?;
        let identifier: [u8; 16] = identifier_bytes.try_into().map_err(|v: Vec<u8>| {
            DoraError::WorkerInfoParse(format!(
                "identifier must be 16 bytes, got {}",
                v.len()
            ))
        })?;
        Ok(WorkerEntity {
            identity: WorkerIdentity::new(wire.identity.version, identifier),
            address: wire.address,
        })
    }

    pub fn from_host_and_port(host: &str, http_server_port: u16) -> Self {
        WorkerEntity {
            identity: WorkerIdentity::from_hostname(host),
            address: WorkerNetAddress::from_host(host, http_server_port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_host_and_port_is_deterministic() {
        let a = WorkerEntity::from_host_and_port("worker-1", 28080);
        let b = WorkerEntity::from_host_and_port("worker-1", 28080);
        assert_eq!(a, b);
        assert_eq!(a.identity.version, DEFAULT_WORKER_IDENTIFIER_VERSION);
    }

    #[test]
    fn different_hosts_yield_different_identities() {
        let a = WorkerEntity::from_host_and_port("worker-1", 28080);
        let b = WorkerEntity::from_host_and_port("worker-2", 28080);
        assert_ne!(a.identity, b.identity);
    }

    #[test]
    fn decodes_registry_value_with_defaults() {
        let json = br#"{"Identity":{"version":1,"identifier":"00112233445566778899aabbccddeeff"},"WorkerNetAddress":{"Host":"10.0.0.1"}}"#;
        let entity = WorkerEntity::from_registry_value(json).unwrap();
        assert_eq!(entity.address.host, "10.0.0.1");
        assert_eq!(entity.address.http_server_port, DEFAULT_WORKER_HTTP_SERVER_PORT);
    }

    #[test]
    fn rejects_malformed_identifier() {
        let json = br#"{"Identity":{"version":1,"identifier":"zz"},"WorkerNetAddress":{}}"#;
        assert!(WorkerEntity::from_registry_value(json).is_err());
    }
}
