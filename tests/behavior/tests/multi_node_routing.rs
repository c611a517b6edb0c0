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

use aerospike_types::partition_id;
use aerospike_types::Bin;
use aerospike_types::Key;
use aerospike_types::ReadPolicy;
use aerospike_types::Value;
use aerospike_types::WritePolicy;
use aerospike_types::N_PARTITIONS;
use behavior_tests::multi_node_harness;
use behavior_tests::MultiNodeTestkit;
use test_harness::test;

fn key_in_half(namespace: &str, set: &str, lower_half: bool) -> Key {
    let half = N_PARTITIONS / 2;
    (0..10_000)
        .map(|i| Key::new(namespace, set, i as i64).unwrap())
        .find(|k| (partition_id(k.digest()) < half) == lower_half)
        .expect("a key landing in the requested partition half must exist within the search range")
}

#[test(multi_node_harness)]
async fn test_writes_land_on_the_node_owning_the_key_partition(testkit: MultiNodeTestkit) {
    let key_a = key_in_half("test", "players", true);
    let key_b = key_in_half("test", "players", false);

    testkit.client.put(&WritePolicy::default(), &key_a, &[Bin::new("v", 1i64).unwrap()]).await.unwrap();
    testkit.client.put(&WritePolicy::default(), &key_b, &[Bin::new("v", 2i64).unwrap()]).await.unwrap();

    assert_eq!(testkit.node_a.record_count(), 1);
    assert_eq!(testkit.node_b.record_count(), 1);

    let record_a = testkit.client.get(&ReadPolicy::default(), &key_a, &[]).await.unwrap().unwrap();
    assert_eq!(record_a.bin("v"), Some(&Value::Integer(1)));
    let record_b = testkit.client.get(&ReadPolicy::default(), &key_b, &[]).await.unwrap().unwrap();
    assert_eq!(record_b.bin("v"), Some(&Value::Integer(2)));
}

#[test(multi_node_harness)]
async fn test_losing_one_node_only_fails_requests_routed_to_it(testkit: MultiNodeTestkit) {
    let key_a = key_in_half("test", "players", true);
    let key_b = key_in_half("test", "players", false);

    testkit.node_a.shutdown();

    // node-b still answers for keys its half of the partition map owns.
    testkit.client.put(&WritePolicy::default(), &key_b, &[Bin::new("v", 1i64).unwrap()]).await.unwrap();
    assert_eq!(testkit.node_b.record_count(), 1);

    // node-a is gone, so a key routed to it fails instead of silently
    // succeeding against the wrong node.
    let err = testkit.client.put(&WritePolicy::default(), &key_a, &[Bin::new("v", 1i64).unwrap()]).await;
    assert!(err.is_err());
}
