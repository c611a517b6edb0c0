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

//! The per-namespace partition-to-node map. Published as an immutable
//! snapshot behind an `ArcSwap` so readers (the router, on every request)
//! never block on the tend loop's writes.

use aerospike_types::N_PARTITIONS;

/// Which nodes, by name, own a single partition. `replicas[0]` is the master;
/// the remaining entries are prole replicas in preference order. A slot with
/// no name means the tend loop hasn't heard about that partition's owner yet.
#[derive(Debug, Clone, Default)]
pub struct PartitionEntry {
    pub replicas: Vec<Option<String>>,
}

impl PartitionEntry {
    pub fn master(&self) -> Option<&str> {
        self.replicas.first().and_then(|n| n.as_deref())
    }

    pub fn replica(&self, index: usize) -> Option<&str> {
        self.replicas.get(index).and_then(|n| n.as_deref()).or_else(|| self.master())
    }

    /// How many replica ranks (master plus proles) are known for this
    /// partition. Used to bound round-robin/sequence replica selection; `0`
    /// when the tend loop hasn't heard about this partition at all.
    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }
}

/// The full partition table for one namespace: exactly `N_PARTITIONS` entries.
#[derive(Debug, Clone)]
pub struct PartitionTable {
    entries: Vec<PartitionEntry>,
}

impl PartitionTable {
    pub fn empty() -> Self {
        PartitionTable {
            entries: vec![PartitionEntry::default(); N_PARTITIONS as usize],
        }
    }

    pub fn set_master(&mut self, partition_id: u16, node_name: String) {
        let entry = &mut self.entries[partition_id as usize];
        if entry.replicas.is_empty() {
            entry.replicas.push(Some(node_name));
        } else {
            entry.replicas[0] = Some(node_name);
        }
    }

    pub fn set_replica(&mut self, partition_id: u16, index: usize, node_name: String) {
        let entry = &mut self.entries[partition_id as usize];
        while entry.replicas.len() <= index {
            entry.replicas.push(None);
        }
        entry.replicas[index] = Some(node_name);
    }

    pub fn entry(&self, partition_id: u16) -> &PartitionEntry {
        &self.entries[partition_id as usize]
    }
}
