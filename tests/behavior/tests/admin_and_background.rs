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

use aerospike::BatchPolicy;
use aerospike::IndexType;
use aerospike::Operation;
use aerospike::ScanPolicy;
use aerospike_types::Bin;
use aerospike_types::Key;
use aerospike_types::Value;
use behavior_tests::harness;
use behavior_tests::Testkit;
use test_harness::test;

const DEADLINE: Duration = Duration::from_secs(1);

#[test(harness)]
async fn test_secondary_index_round_trips(testkit: Testkit) {
    testkit
        .client
        .index_create("test", "players", "level", "players_level_idx", IndexType::Numeric, DEADLINE)
        .await
        .unwrap();
    testkit.client.index_remove("test", "players_level_idx", DEADLINE).await.unwrap();
}

#[test(harness)]
async fn test_udf_module_round_trips(testkit: Testkit) {
    let content = b"function main() end".to_vec();
    testkit.client.udf_put("scoring", &content, DEADLINE).await.unwrap();

    let modules = testkit.client.udf_list(DEADLINE).await.unwrap();
    assert_eq!(modules, vec!["scoring".to_string()]);

    let fetched = testkit.client.udf_get("scoring", DEADLINE).await.unwrap();
    assert_eq!(fetched, content);

    testkit.client.udf_remove("scoring", DEADLINE).await.unwrap();
    assert!(testkit.client.udf_list(DEADLINE).await.unwrap().is_empty());
}

#[test(harness)]
async fn test_user_roles_round_trip(testkit: Testkit) {
    testkit
        .client
        .user_create("alice", "hunter2", &["read-write"], DEADLINE)
        .await
        .unwrap();

    testkit.client.grant_roles("alice", &["sys-admin"], DEADLINE).await.unwrap();
    let info = testkit.client.query_user("alice", DEADLINE).await.unwrap();
    assert_eq!(info.name, "alice");
    assert!(info.roles.contains(&"read-write".to_string()));
    assert!(info.roles.contains(&"sys-admin".to_string()));

    testkit.client.revoke_roles("alice", &["sys-admin"], DEADLINE).await.unwrap();
    let info = testkit.client.query_user("alice", DEADLINE).await.unwrap();
    assert!(!info.roles.contains(&"sys-admin".to_string()));

    testkit.client.set_password("alice", "hunter3", DEADLINE).await.unwrap();
    testkit.client.user_drop("alice", DEADLINE).await.unwrap();
}

#[test(harness)]
async fn test_batch_exists_and_operate_match_per_key_state(testkit: Testkit) {
    let present = Key::new("test", "players", "present").unwrap();
    testkit.node.seed(
        "test",
        "players",
        *present.digest(),
        vec![Bin {
            name: "level".to_string(),
            value: Value::Integer(1),
        }],
    );
    let missing = Key::new("test", "players", "missing").unwrap();

    let exists = testkit
        .client
        .batch_exists(&BatchPolicy::default(), &[present.clone(), missing.clone()])
        .await
        .unwrap();
    assert_eq!(exists, vec![true, false]);

    let policy = BatchPolicy {
        allow_partial_results: true,
        ..Default::default()
    };
    let results = testkit
        .client
        .batch_operate(&policy, &[present, missing], vec![Operation::write("level", Value::Integer(2))])
        .await
        .unwrap();
    assert!(results[0].is_some());
    assert!(results[1].is_some());
}

#[test(harness)]
async fn test_background_scan_updates_every_matching_record_and_job_wait_observes_completion(testkit: Testkit) {
    for i in 0..3 {
        let key = Key::new("test", "players", i as i64).unwrap();
        testkit.node.seed(
            "test",
            "players",
            *key.digest(),
            vec![Bin {
                name: "level".to_string(),
                value: Value::Integer(0),
            }],
        );
    }

    let task_id = testkit
        .client
        .scan_background(&ScanPolicy::default(), "test", "players", vec![Operation::write("level", Value::Integer(9))])
        .await
        .unwrap();

    testkit
        .client
        .job_wait(task_id, Duration::from_millis(20), Duration::from_secs(1))
        .await
        .unwrap();

    let key = Key::new("test", "players", 0i64).unwrap();
    let record = testkit
        .client
        .get(&Default::default(), &key, &[])
        .await
        .unwrap()
        .expect("record should still exist after background scan");
    assert_eq!(record.bin("level"), Some(&Value::Integer(9)));
}
