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

//! Plain data types shared by every layer of the client: keys, values, bins,
//! records, policies and the error taxonomy. No I/O lives here.

pub mod config;
mod error;
mod key;
mod partition_status;
mod policy;
mod record;
mod value;

pub use error::ClientError;
pub use error::ErrorKind;
pub use key::Key;
pub use partition_status::PartitionFilter;
pub use partition_status::PartitionStatusEntry;
pub use partition_status::PartitionsStatus;
pub use policy::BasePolicy;
pub use policy::BatchPolicy;
pub use policy::ClientPolicy;
pub use policy::ConsistencyLevel;
pub use policy::GenerationPolicy;
pub use policy::Priority;
pub use policy::QueryPolicy;
pub use policy::ReadPolicy;
pub use policy::RecordExistsAction;
pub use policy::Replica;
pub use policy::ScanPolicy;
pub use policy::WritePolicy;
pub use record::Bin;
pub use record::Record;
pub use value::Value;
pub use value::ValueType;

/// Number of partitions a namespace is divided into. Fixed by the server wire
/// protocol, not negotiable per-cluster.
pub const N_PARTITIONS: u16 = 4096;

/// A server-assigned transaction handle for opt-in multi-record transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(pub u64);

/// Returns the partition id `digest` belongs to.
///
/// `partition_id(digest) = first_two_bytes(digest) & (N_PARTITIONS - 1)`, matching the
/// server's own partition assignment rule (`§4.1`/`§8` of the design).
pub fn partition_id(digest: &[u8; 20]) -> u16 {
    let first_two = u16::from_le_bytes([digest[0], digest[1]]);
    first_two & (N_PARTITIONS - 1)
}
