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

//! The public surface of the crate: a [`Client`] handle that connects to a
//! cluster and exposes single-record, batch, scan, query, UDF and info
//! operations. Everything below `aerospike-router` is an implementation
//! detail callers shouldn't need to reach for.

mod admin;
mod client;
mod message;
mod scan;

pub use admin::IndexType;
pub use admin::UserInfo;
pub use client::Client;
pub use scan::RecordStream;

pub use aerospike_types::config::ClusterConfig;
pub use aerospike_types::config::TlsConfig;
pub use aerospike_types::Bin;
pub use aerospike_types::BasePolicy;
pub use aerospike_types::BatchPolicy;
pub use aerospike_types::ClientError;
pub use aerospike_types::ClientPolicy;
pub use aerospike_types::ConsistencyLevel;
pub use aerospike_types::GenerationPolicy;
pub use aerospike_types::Key;
pub use aerospike_types::PartitionFilter;
pub use aerospike_types::PartitionStatusEntry;
pub use aerospike_types::PartitionsStatus;
pub use aerospike_types::Priority;
pub use aerospike_types::QueryPolicy;
pub use aerospike_types::ReadPolicy;
pub use aerospike_types::Record;
pub use aerospike_types::RecordExistsAction;
pub use aerospike_types::Replica;
pub use aerospike_types::ScanPolicy;
pub use aerospike_types::Value;
pub use aerospike_types::WritePolicy;

pub use aerospike_protocol::ops::Operation;

/// Shorthand for the `Result` every fallible call on this crate returns.
pub type Result<T> = error_stack::Result<T, ClientError>;
