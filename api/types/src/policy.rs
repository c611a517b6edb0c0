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

use std::time::Duration;

/// Which copy of a partition a read may be served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Replica {
    #[default]
    Master,
    Any,
    Sequence,
    PreferRack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsistencyLevel {
    #[default]
    One,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationPolicy {
    #[default]
    None,
    ExpectGenEqual,
    ExpectGenGreater,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordExistsAction {
    #[default]
    Update,
    UpdateOnly,
    Replace,
    ReplaceOnly,
    CreateOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Default,
    Low,
    Medium,
    High,
}

/// Per-operation timeouts and retry knobs shared by every policy kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasePolicy {
    /// Deadline for a single attempt.
    pub socket_timeout: Duration,
    /// Deadline for the whole command, including retries and sleeps.
    pub total_timeout: Duration,
    pub max_retries: u32,
    pub sleep_between_retries: Duration,
    pub replica: Replica,
    pub consistency_level: ConsistencyLevel,
}

impl Default for BasePolicy {
    fn default() -> Self {
        BasePolicy {
            socket_timeout: Duration::from_millis(500),
            total_timeout: Duration::from_secs(1),
            max_retries: 2,
            sleep_between_retries: Duration::from_millis(0),
            replica: Replica::Master,
            consistency_level: ConsistencyLevel::One,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadPolicy {
    pub base: BasePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePolicy {
    pub base: BasePolicy,
    pub generation_policy: GenerationPolicy,
    pub expected_generation: u32,
    pub exists_action: RecordExistsAction,
    pub durable_delete: bool,
    /// Seconds from now the written record expires; `0` uses the namespace default,
    /// `u32::MAX` never expires.
    pub expiration: u32,
}

impl Default for WritePolicy {
    fn default() -> Self {
        let mut base = BasePolicy::default();
        base.replica = Replica::Master;
        WritePolicy {
            base,
            generation_policy: GenerationPolicy::None,
            expected_generation: 0,
            exists_action: RecordExistsAction::Update,
            durable_delete: false,
            expiration: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchPolicy {
    pub base: BasePolicy,
    /// When a key in the batch fails, keep going and report per-key status rather
    /// than aborting the whole batch.
    pub allow_partial_results: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPolicy {
    pub base: BasePolicy,
    pub priority: Priority,
    pub max_records: u64,
    pub records_per_second: u32,
    pub concurrent_nodes: bool,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        ScanPolicy {
            base: BasePolicy::default(),
            priority: Priority::default(),
            max_records: 0,
            records_per_second: 0,
            concurrent_nodes: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    pub base: BasePolicy,
    pub priority: Priority,
    pub max_records: u64,
    pub records_per_second: u32,
    pub concurrent_nodes: bool,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        QueryPolicy {
            base: BasePolicy::default(),
            priority: Priority::default(),
            max_records: 0,
            records_per_second: 0,
            concurrent_nodes: true,
        }
    }
}

/// Process-wide client knobs: pool sizing, tend interval, TLS. Distinct from the
/// per-op policies above, which the caller passes on every call.
#[derive(Debug, Clone)]
pub struct ClientPolicy {
    pub min_connections_per_node: u32,
    pub max_connections_per_node: u32,
    pub max_socket_idle: Duration,
    pub tend_interval: Duration,
    pub failed_tend_threshold: u32,
    pub login_timeout: Duration,
    pub use_compression: bool,
    pub compression_threshold_bytes: usize,
}

impl Default for ClientPolicy {
    fn default() -> Self {
        ClientPolicy {
            min_connections_per_node: 1,
            max_connections_per_node: 100,
            max_socket_idle: Duration::from_secs(55),
            tend_interval: Duration::from_secs(1),
            failed_tend_threshold: 5,
            login_timeout: Duration::from_secs(5),
            use_compression: false,
            compression_threshold_bytes: 0,
        }
    }
}
