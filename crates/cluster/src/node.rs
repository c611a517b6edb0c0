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

use std::net::SocketAddr;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use aerospike_pool::ConnectionPool;

/// A single server process in the cluster: its pool of connections and the
/// health bookkeeping the tend loop uses to decide when to evict it. Once
/// `failed_tends` reaches the configured threshold the tend loop removes this
/// node from [`crate::ClusterState`] entirely; it comes back only if a later
/// tend pass (against some other still-healthy node) reports it again.
pub struct Node {
    pub name: String,
    pub addr: SocketAddr,
    pub pool: ConnectionPool,
    failed_tends: AtomicU32,
}

impl Node {
    pub fn new(name: String, addr: SocketAddr, pool: ConnectionPool) -> Self {
        Node {
            name,
            addr,
            pool,
            failed_tends: AtomicU32::new(0),
        }
    }

    pub fn note_tend_success(&self) {
        self.failed_tends.store(0, Ordering::Relaxed);
    }

    pub fn note_tend_failure(&self) -> u32 {
        self.failed_tends.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn is_healthy(&self, failed_tend_threshold: u32) -> bool {
        self.failed_tends.load(Ordering::Relaxed) < failed_tend_threshold
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("addr", &self.addr)
            .finish()
    }
}
