//! Ring manager (C4): owns the current `(ring, identity map)` pair, keeps it
//! coherent with the registry, and answers worker-selection queries.
//!
//! Grounded on `original_source/alluxio/worker_ring.py`
//! (`ConsistentHashProvider`) for the diff/refresh/selection algorithm, and
//! on `mesh/src/controller.rs` for the cancellable-background-task idiom
//! (a `tokio::task` gated by a cancellation signal, errors logged and
//! swallowed rather than propagated) used by the teacher's own gossip
//! refresh loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use crate::config::{DoraClientConfig, MembershipSource};
use crate::error::{DoraError, DoraResult};
use crate::hash::HashRing;
use crate::registry::RegistryClient;
use crate::worker::{WorkerEntity, WorkerIdentity, WorkerNetAddress};

type IdentityMap = HashMap<WorkerIdentity, WorkerNetAddress>;

struct RingSnapshot {
    ring: HashRing,
    identities: IdentityMap,
}

/// Owns the live ring + identity map and (optionally) a background refresh
/// task. Reads are lock-free (an `ArcSwap` load); refreshes serialize
/// through a single mutex (§4.3, §5).
pub struct RingManager {
    snapshot: ArcSwap<RingSnapshot>,
    refresh_lock: AsyncMutex<()>,
    registry: Option<RegistryClient>,
    hash_node_per_worker: u32,
    cancel: CancellationToken,
    refresh_handle: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

const SELECTION_ATTEMPT_CAP: u32 = 100;

impl RingManager {
    /// Performs the initial synchronous population and, if configured for
    /// the registry with a positive refresh interval, spawns the
    /// background refresh loop.
    pub async fn new(config: &DoraClientConfig) -> DoraResult<Arc<Self>> {
        let hash_node_per_worker = config.hash_node_per_worker;
        let (registry, initial_identities) = match &config.membership {
            MembershipSource::Static { worker_hosts } => {
                let mut map = IdentityMap::new();
                for host in worker_hosts {
                    let entity = WorkerEntity::from_host_and_port(host, config.worker_http_port);
                    map.insert(entity.identity, entity.address);
                }
                (None, map)
            }
            MembershipSource::Registry {
                etcd_hosts,
                etcd_port,
                credentials,
                ..
            } => {
                let registry = RegistryClient::new(
                    etcd_hosts.clone(),
                    *etcd_port,
                    &config.cluster_name,
                    credentials.clone(),
                )?;
                let entities = registry.fetch().await?;
                let map = to_identity_map(entities);
                (Some(registry), map)
            }
        };

        let ring = HashRing::build(initial_identities.keys(), hash_node_per_worker);
        let manager = Arc::new(Self {
            snapshot: ArcSwap::from_pointee(RingSnapshot {
                ring,
                identities: initial_identities,
            }),
            refresh_lock: AsyncMutex::new(()),
            registry,
            hash_node_per_worker,
            cancel: CancellationToken::new(),
            refresh_handle: std::sync::Mutex::new(None),
        });

        if let MembershipSource::Registry {
            refresh_interval_secs,
            ..
        } = &config.membership
        {
            if *refresh_interval_secs > 0 {
                manager.clone().start_background_refresh(*refresh_interval_secs as u64);
            }
        }

        Ok(manager)
    }

    fn start_background_refresh(self: Arc<Self>, interval_secs: u64) {
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.tick().await; // first tick fires immediately; skip it, initial fetch already ran
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.refresh().await {
                            tracing::error!(error = %e, "error updating worker hash ring");
                        }
                    }
                }
            }
        });
        *self.refresh_handle.lock().unwrap() = Some(handle);
    }

    /// Fetches the current membership from the registry and swaps the ring
    /// if the membership differs (§4.3 diff rule). A no-op for
    /// statically-configured clients.
    pub async fn refresh(&self) -> DoraResult<()> {
        let Some(registry) = &self.registry else {
            return Ok(());
        };
        let _guard = self.refresh_lock.lock().await;
        crate::metrics::ring_refresh_attempted();

        let entities = match registry.fetch().await {
            Ok(entities) => entities,
            Err(DoraError::RegistryEmpty { .. }) => {
                // Empty fetch is "no change", never a failure on refresh.
                return Ok(());
            }
            Err(e) => {
                crate::metrics::ring_refresh_failed();
                return Err(e);
            }
        };
        let fresh = to_identity_map(entities);

        let current = self.snapshot.load();
        if !membership_differs(&current.identities, &fresh) {
            return Ok(());
        }

        let worker_count = fresh.len();
        let ring = HashRing::build(fresh.keys(), self.hash_node_per_worker);
        self.snapshot.store(Arc::new(RingSnapshot {
            ring,
            identities: fresh,
        }));
        crate::metrics::ring_swapped(worker_count);
        Ok(())
    }

    /// Selects up to `count` distinct worker addresses for `path` (§4.3).
    pub fn select(&self, path: &str, count: usize) -> DoraResult<Vec<WorkerNetAddress>> {
        let snapshot = self.snapshot.load();
        let total_workers = snapshot
            .identities
            .keys()
            .collect::<std::collections::HashSet<_>>()
            .len();

        if count >= total_workers {
            return Ok(snapshot.identities.values().cloned().collect());
        }

        let mut selected_identities: Vec<WorkerIdentity> = Vec::with_capacity(count);
        let mut attempt = 1u32;
        while selected_identities.len() < count && attempt <= SELECTION_ATTEMPT_CAP {
            let key = crate::path::attempt_hash(path, attempt);
            if let Some(identity) = snapshot.ring.ceil(key) {
                if !selected_identities.contains(&identity) {
                    selected_identities.push(identity);
                }
            }
            attempt += 1;
        }

        let addresses = selected_identities
            .into_iter()
            .filter_map(|identity| snapshot.identities.get(&identity).cloned())
            .collect();
        Ok(addresses)
    }

    /// Deterministic single-worker selection used by every facade operation.
    pub fn select_preferred(&self, path: &str) -> DoraResult<WorkerNetAddress> {
        let workers = self.select(path, 1)?;
        if workers.len() != 1 {
            return Err(DoraError::Routing {
                expected: 1,
                actual: workers.len(),
            });
        }
        Ok(workers.into_iter().next().unwrap())
    }

    /// Stops the background refresh task, if any, and joins it.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.refresh_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

fn to_identity_map(entities: std::collections::HashSet<WorkerEntity>) -> IdentityMap {
    entities
        .into_iter()
        .map(|e| (e.identity, e.address))
        .collect()
}

fn membership_differs(current: &IdentityMap, fresh: &IdentityMap) -> bool {
    if current.len() != fresh.len() {
        return true;
    }
    fresh.iter().any(|(identity, address)| {
        current.get(identity).map(|a| a != address).unwrap_or(true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DoraClientConfig;

    #[tokio::test]
    async fn static_three_host_ring_selects_all_three() {
        let config = DoraClientConfig::builder()
            .worker_hosts("h1,h2,h3")
            .hash_node_per_worker(5)
            .build()
            .unwrap();
        let manager = RingManager::new(&config).await.unwrap();
        let selected = manager.select("s3://bucket/x", 3).unwrap();
        assert_eq!(selected.len(), 3);
        let hosts: std::collections::HashSet<_> = selected.iter().map(|a| a.host.clone()).collect();
        assert_eq!(
            hosts,
            ["h1", "h2", "h3"].into_iter().map(String::from).collect()
        );
    }

    #[tokio::test]
    async fn select_preferred_is_deterministic() {
        let config = DoraClientConfig::builder()
            .worker_hosts("h1,h2,h3")
            .build()
            .unwrap();
        let manager = RingManager::new(&config).await.unwrap();
        let a = manager.select_preferred("s3://bucket/obj").unwrap();
        let b = manager.select_preferred("s3://bucket/obj").unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn select_with_count_ge_workers_returns_all() {
        let config = DoraClientConfig::builder().worker_hosts("h1,h2").build().unwrap();
        let manager = RingManager::new(&config).await.unwrap();
        let selected = manager.select("s3://bucket/x", 10).unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn membership_diff_detects_address_change() {
        let id = WorkerIdentity::new(1, [0u8; 16]);
        let mut a = IdentityMap::new();
        a.insert(id, WorkerNetAddress::from_host("h1", 28080));
        let mut b = IdentityMap::new();
        b.insert(id, WorkerNetAddress::from_host("h2", 28080));
        assert!(membership_differs(&a, &b));
        assert!(!membership_differs(&a, &a.clone()));
    }
}
