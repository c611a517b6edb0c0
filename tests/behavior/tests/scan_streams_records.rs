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

use aerospike_types::Bin;
use aerospike_types::Key;
use aerospike_types::ScanPolicy;
use aerospike_types::Value;
use behavior_tests::harness;
use behavior_tests::Testkit;
use futures::StreamExt;
use test_harness::test;

#[test(harness)]
async fn test_scan_streams_every_record_in_the_set(testkit: Testkit) {
    for i in 0..5 {
        let key = Key::new("test", "players", i as i64).unwrap();
        testkit.node.seed(
            "test",
            "players",
            *key.digest(),
            vec![Bin {
                name: "level".to_string(),
                value: Value::Integer(i),
            }],
        );
    }
    // A record in a different set must not show up in the scan below.
    let other_key = Key::new("test", "monsters", "goblin").unwrap();
    testkit.node.seed("test", "monsters", *other_key.digest(), vec![]);

    let mut stream = testkit
        .client
        .scan(&ScanPolicy::default(), "test", "players", &[])
        .await
        .unwrap();

    let mut levels = Vec::new();
    while let Some(record) = stream.next().await {
        let record = record.unwrap();
        levels.push(record.bin("level").and_then(|v| match v {
            Value::Integer(n) => Some(*n),
            _ => None,
        }));
    }
    levels.sort();
    assert_eq!(levels, vec![Some(0), Some(1), Some(2), Some(3), Some(4)]);
}

#[test(harness)]
async fn test_scan_of_empty_set_yields_no_records(testkit: Testkit) {
    let mut stream = testkit
        .client
        .scan(&ScanPolicy::default(), "test", "empty", &[])
        .await
        .unwrap();
    assert!(stream.next().await.is_none());
}
