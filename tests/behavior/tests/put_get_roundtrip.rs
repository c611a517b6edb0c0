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
use aerospike_types::ReadPolicy;
use aerospike_types::Value;
use aerospike_types::WritePolicy;
use behavior_tests::harness;
use behavior_tests::Testkit;
use test_harness::test;

#[test(harness)]
async fn test_put_then_get_returns_the_written_bins(testkit: Testkit) {
    let key = Key::new("test", "players", "alice").unwrap();
    let bins = vec![
        Bin::new("level", 7i64).unwrap(),
        Bin::new("name", "alice").unwrap(),
    ];

    testkit.client.put(&WritePolicy::default(), &key, &bins).await.unwrap();

    let record = testkit
        .client
        .get(&ReadPolicy::default(), &key, &[])
        .await
        .unwrap()
        .expect("record should exist after put");
    assert_eq!(record.bin("level"), Some(&Value::Integer(7)));
    assert_eq!(record.bin("name"), Some(&Value::from("alice")));
    assert_eq!(record.generation, 1);
}

#[test(harness)]
async fn test_get_of_unknown_key_returns_none(testkit: Testkit) {
    let key = Key::new("test", "players", "nobody").unwrap();
    let record = testkit.client.get(&ReadPolicy::default(), &key, &[]).await.unwrap();
    assert_eq!(record, None);
}

#[test(harness)]
async fn test_exists_and_delete_round_trip(testkit: Testkit) {
    let key = Key::new("test", "players", "bob").unwrap();
    let bins = vec![Bin::new("level", 1i64).unwrap()];

    assert!(!testkit.client.exists(&ReadPolicy::default(), &key).await.unwrap());

    testkit.client.put(&WritePolicy::default(), &key, &bins).await.unwrap();
    assert!(testkit.client.exists(&ReadPolicy::default(), &key).await.unwrap());

    let existed = testkit.client.delete(&WritePolicy::default(), &key).await.unwrap();
    assert!(existed);
    assert!(!testkit.client.exists(&ReadPolicy::default(), &key).await.unwrap());

    let existed_again = testkit.client.delete(&WritePolicy::default(), &key).await.unwrap();
    assert!(!existed_again);
}

#[test(harness)]
async fn test_touch_requires_an_existing_record(testkit: Testkit) {
    let key = Key::new("test", "players", "carol").unwrap();

    let err = testkit.client.touch(&WritePolicy::default(), &key).await.unwrap_err();
    assert!(format!("{err:?}").contains("key not found"));

    testkit
        .client
        .put(&WritePolicy::default(), &key, &[Bin::new("level", 1i64).unwrap()])
        .await
        .unwrap();
    testkit.client.touch(&WritePolicy::default(), &key).await.unwrap();
}

#[test(harness)]
async fn test_put_increments_generation_on_each_write(testkit: Testkit) {
    let key = Key::new("test", "players", "dave").unwrap();
    let bins = vec![Bin::new("level", 1i64).unwrap()];

    testkit.client.put(&WritePolicy::default(), &key, &bins).await.unwrap();
    testkit.client.put(&WritePolicy::default(), &key, &bins).await.unwrap();

    let record = testkit.client.get(&ReadPolicy::default(), &key, &[]).await.unwrap().unwrap();
    assert_eq!(record.generation, 2);
}
