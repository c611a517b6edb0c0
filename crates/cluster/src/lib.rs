// Copyright 2024 tison <wander4096@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cluster membership and partition map maintenance. A background tend loop
//! periodically refreshes both from whichever node answers first; readers
//! (the router) consult an `ArcSwap`-published snapshot so a slow tend pass
//! never blocks a request in flight.

mod node;
mod partition;
mod tend;

pub use node::Node;
pub use partition::PartitionEntry;
pub use partition::PartitionTable;

use std::net::IpAddr;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use aerospike_pool::ConnectionPool;
use aerospike_runtime::Runtime;
use aerospike_types::config::ClusterConfig;
use aerospike_types::ClientError;
use aerospike_types::ClientPolicy;
use arc_swap::ArcSwap;
use dashmap::DashMap;

/// Live membership and partition ownership for one cluster. Cheap to clone;
/// every clone shares the same underlying tables.
#[derive(Clone)]
pub struct ClusterState {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClusterConfig,
    nodes: DashMap<String, Arc<Node>>,
    partitions: DashMap<String, ArcSwap<PartitionTable>>,
}

impl ClusterState {
    /// Resolves the seed hosts and performs one tend pass against each
    /// reachable one, so the returned cluster already has a usable partition
    /// map; callers then spawn [`ClusterState::spawn_tend_loop`] to keep it
    /// fresh. Every seed is tended, not just the first that answers: a
    /// cluster with multiple independent seeds (as opposed to one seed whose
    /// peers cover the rest) needs every one of them to learn its share of
    /// the membership.
    pub async fn connect(config: ClusterConfig) -> error_stack::Result<Self, ClientError> {
        let cluster = ClusterState {
            inner: Arc::new(Inner {
                config: config.clone(),
                nodes: DashMap::new(),
                partitions: DashMap::new(),
            }),
        };

        let mut any_reachable = false;
        for seed in &config.seed_hosts {
            if cluster.tend_seed(seed).await.is_ok() {
                any_reachable = true;
            }
        }
        if any_reachable {
            Ok(cluster)
        } else {
            Err(error_stack::Report::new(ClientError::cluster("no seed host was reachable")))
        }
    }

    async fn tend_seed(&self, seed: &str) -> error_stack::Result<(), ClientError> {
        let addr = resolve(seed)?;
        self.tend_node(seed.to_string(), addr).await
    }

    async fn tend_node(&self, fallback_name: String, addr: SocketAddr) -> error_stack::Result<(), ClientError> {
        let policy = &self.inner.config.client_policy;
        let tls = self
            .inner
            .config
            .tls
            .clone()
            .map(|t| (t, addr.ip().to_string()));

        let mut socket = aerospike_socket::Socket::connect(addr, policy.login_timeout, tls.as_ref().map(|(c, n)| (c, n.as_str()))).await?;
        let report = tend::tend(&mut socket, policy.login_timeout).await?;
        drop(socket);

        let node_name = if report.node_name.is_empty() { fallback_name } else { report.node_name };
        self.upsert_node(node_name.clone(), addr);

        for (peer_name, peer_addr) in report.peers {
            let peer_addr = self.translate_alternate_address(peer_addr);
            self.upsert_node(peer_name, peer_addr);
        }

        for (ns, table) in report.partitions {
            self.inner
                .partitions
                .entry(ns)
                .or_insert_with(|| ArcSwap::from_pointee(PartitionTable::empty()))
                .store(Arc::new(table));
        }

        if let Some(node) = self.inner.nodes.get(&node_name) {
            node.note_tend_success();
        }
        Ok(())
    }

    /// TLS config for a node's operational connection pool. When
    /// `TlsConfig::login_only` is set, TLS is only ever used for the tend
    /// handshake in [`ClusterState::tend_node`]; every other connection a
    /// node's pool opens for ordinary requests is plaintext.
    fn pool_tls(&self, addr: SocketAddr) -> Option<(aerospike_types::config::TlsConfig, String)> {
        let tls = self.inner.config.tls.clone()?;
        if tls.login_only {
            return None;
        }
        Some((tls, addr.ip().to_string()))
    }

    /// Maps a discovered peer address through `ClusterConfig.alternate_names`
    /// (keyed by IP, private-to-public style) so it's dialed on the routable
    /// address rather than the one the node reported about itself.
    fn translate_alternate_address(&self, addr: SocketAddr) -> SocketAddr {
        match self.inner.config.alternate_names.get(&addr.ip().to_string()) {
            Some(replacement) => match replacement.parse::<IpAddr>() {
                Ok(ip) => SocketAddr::new(ip, addr.port()),
                Err(_) => addr,
            },
            None => addr,
        }
    }

    /// Inserts or updates a known node, handling the two ways a name and an
    /// address can fall out of sync: the same name now reporting a different
    /// address (the node moved, or was replaced), or the same address now
    /// reporting a different name (a stale entry under the old name lingers).
    /// Either case drops the stale entry's pool before installing the fresh
    /// one, rather than keeping both around.
    fn upsert_node(&self, name: String, addr: SocketAddr) {
        if let Some(existing) = self.inner.nodes.get(&name) {
            if existing.addr == addr {
                return;
            }
            log::info!("node {name} now reports address {addr}, was {}; replacing its pool", existing.addr);
            drop(existing);
            self.inner.nodes.remove(&name);
        } else if let Some(stale_name) = self.inner.nodes.iter().find(|n| n.addr == addr).map(|n| n.key().clone()) {
            log::info!("address {addr} now reports node name {name:?}, was {stale_name:?}; replacing the stale entry");
            self.inner.nodes.remove(&stale_name);
        }

        let policy = &self.inner.config.client_policy;
        let tls = self.pool_tls(addr);
        let pool = ConnectionPool::new(
            addr,
            policy.min_connections_per_node as usize,
            policy.max_connections_per_node as usize,
            policy.login_timeout,
            policy.max_socket_idle,
            tls,
        );
        self.inner.nodes.insert(name.clone(), Arc::new(Node::new(name, addr, pool)));
    }

    /// Removes a node that has exceeded `failed_tend_threshold` consecutive
    /// failed tends. Any partition table entry still naming it falls back to
    /// reporting no owner for that rank until a later tend pass (against some
    /// other node) reports a replacement.
    fn evict_node(&self, name: &str) {
        if self.inner.nodes.remove(name).is_some() {
            log::warn!("evicted node {name} after too many consecutive failed tends");
        }
    }

    /// The client policy this cluster was configured with.
    pub fn client_policy(&self) -> ClientPolicy {
        self.inner.config.client_policy.clone()
    }

    /// How many replica ranks (master plus proles) are known for `digest`'s
    /// partition in `namespace`. `0` if the namespace's partition map hasn't
    /// been populated yet.
    pub fn replica_count(&self, namespace: &str, partition_id: u16) -> usize {
        self.inner
            .partitions
            .get(namespace)
            .map(|table| table.load().entry(partition_id).replica_count())
            .unwrap_or(0)
    }

    pub fn node(&self, name: &str) -> Option<Arc<Node>> {
        self.inner.nodes.get(name).map(|n| n.clone())
    }

    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.inner.nodes.iter().map(|n| n.clone()).collect()
    }

    /// The node currently responsible for `digest`'s partition at the given
    /// replica rank (`0` = master), falling back to the master if that rank
    /// isn't known yet.
    pub fn node_for(&self, namespace: &str, partition_id: u16, replica_rank: usize) -> Option<Arc<Node>> {
        let table = self.inner.partitions.get(namespace)?;
        let entry = table.load();
        let name = entry.entry(partition_id).replica(replica_rank)?.to_string();
        self.node(&name)
    }

    /// Runs a tend pass against every known node on `policy.tend_interval`
    /// until the handle is dropped or the runtime shuts down: each node gets
    /// its identity/peers/partition ownership refreshed, a node whose
    /// consecutive failures reach `failed_tend_threshold` is evicted, and
    /// every node's pool is trimmed down to `min_connections_per_node`.
    pub fn spawn_tend_loop(&self, runtime: &Runtime) -> aerospike_runtime::JoinHandle<()> {
        let cluster = self.clone();
        let interval = self.inner.config.client_policy.tend_interval;
        let failed_tend_threshold = self.inner.config.client_policy.failed_tend_threshold;
        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                cluster.tend_all(failed_tend_threshold).await;
            }
        })
    }

    /// Tends every currently-known node concurrently, evicting any that have
    /// now failed `failed_tend_threshold` times in a row, then trims each
    /// surviving node's idle pool.
    async fn tend_all(&self, failed_tend_threshold: u32) {
        let nodes = self.nodes();
        let cluster = self.clone();
        let tends = nodes.into_iter().map(|node| {
            let cluster = cluster.clone();
            async move {
                if let Err(err) = cluster.tend_node(node.name.clone(), node.addr).await {
                    log::warn!("tend against {} failed: {err:?}", node.name);
                    let failures = node.note_tend_failure();
                    if failures >= failed_tend_threshold {
                        cluster.evict_node(&node.name);
                    }
                } else {
                    node.pool.trim_idle();
                }
            }
        });
        futures::future::join_all(tends).await;
    }
}

fn resolve(seed: &str) -> error_stack::Result<SocketAddr, ClientError> {
    seed.to_socket_addrs()
        .map_err(|e| error_stack::Report::new(ClientError::parameter(format!("invalid seed host {seed:?}: {e}"))))?
        .next()
        .ok_or_else(|| error_stack::Report::new(ClientError::parameter(format!("seed host {seed:?} resolved to no address"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_ip_literal() {
        let addr = resolve("127.0.0.1:3000").unwrap();
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn rejects_garbage_seed() {
        assert!(resolve("not a host").is_err());
    }
}
