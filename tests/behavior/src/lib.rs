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

use std::future::Future;
use std::process::ExitCode;

use aerospike::Client;
use aerospike_types::config::ClusterConfig;
use aerospike_types::config::LogConfig;
use aerospike_types::config::StderrAppenderConfig;
use aerospike_types::config::TelemetryConfig;
use test_toolkit::FakeNode;

pub struct Testkit {
    pub client: Client,
    pub node: FakeNode,
}

pub fn harness<T, Fut>(test: impl Send + FnOnce(Testkit) -> Fut) -> ExitCode
where
    T: std::process::Termination,
    Fut: Send + Future<Output = T>,
{
    aerospike_telemetry::init(&TelemetryConfig {
        log: LogConfig {
            stderr: Some(StderrAppenderConfig {
                filter: "DEBUG".to_string(),
            }),
        },
    });

    aerospike_runtime::test_runtime().block_on(async move {
        let node = FakeNode::start("BB9020011AC4202").await.expect("failed to start fake node");
        let config = ClusterConfig {
            seed_hosts: vec![node.seed_host()],
            ..Default::default()
        };
        let client = Client::connect(config).await.expect("failed to connect to fake node");

        test(Testkit { client, node }).await.report()
    })
}

/// Two fake nodes, each claiming half the partition space (`a` gets `0..2048`,
/// `b` gets `2048..4096`), so a test can observe the router actually picking
/// different nodes for different keys instead of always landing on the only
/// node in the cluster.
pub struct MultiNodeTestkit {
    pub client: Client,
    pub node_a: FakeNode,
    pub node_b: FakeNode,
}

pub fn multi_node_harness<T, Fut>(test: impl Send + FnOnce(MultiNodeTestkit) -> Fut) -> ExitCode
where
    T: std::process::Termination,
    Fut: Send + Future<Output = T>,
{
    aerospike_telemetry::init(&TelemetryConfig {
        log: LogConfig {
            stderr: Some(StderrAppenderConfig {
                filter: "DEBUG".to_string(),
            }),
        },
    });

    aerospike_runtime::test_runtime().block_on(async move {
        let half = aerospike_types::N_PARTITIONS / 2;
        let node_a = FakeNode::start_with_partitions("node-a", (0..half).collect())
            .await
            .expect("failed to start fake node a");
        let node_b = FakeNode::start_with_partitions("node-b", (half..aerospike_types::N_PARTITIONS).collect())
            .await
            .expect("failed to start fake node b");
        let config = ClusterConfig {
            seed_hosts: vec![node_a.seed_host(), node_b.seed_host()],
            ..Default::default()
        };
        let client = Client::connect(config).await.expect("failed to connect to fake cluster");

        test(MultiNodeTestkit { client, node_a, node_b }).await.report()
    })
}
