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

//! The [`Client`] handle: connects to a cluster, keeps its partition map
//! fresh in the background, and exposes the single-record, batch, scan,
//! query, UDF, admin and info operations callers actually issue.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use aerospike_cluster::ClusterState;
use aerospike_protocol::envelope::Envelope;
use aerospike_protocol::envelope::EnvelopeType;
use aerospike_protocol::fields::Field;
use aerospike_protocol::fields::FieldType;
use aerospike_protocol::info;
use aerospike_protocol::message::info2;
use aerospike_protocol::message::Message;
use aerospike_protocol::message::MessageHeader;
use aerospike_protocol::ops::Operation;
use aerospike_protocol::result_code;
use aerospike_protocol::value_codec;
use aerospike_router::Router;
use aerospike_types::config::ClusterConfig;
use aerospike_types::Bin;
use aerospike_types::ClientError;
use aerospike_types::ErrorKind;
use aerospike_types::Key;
use aerospike_types::PartitionFilter;
use aerospike_types::QueryPolicy;
use aerospike_types::ReadPolicy;
use aerospike_types::Record;
use aerospike_types::ScanPolicy;
use aerospike_types::Value;
use aerospike_types::WritePolicy;

use crate::admin;
use crate::admin::IndexType;
use crate::admin::UserInfo;
use crate::message;
use crate::scan::start as start_scan;
use crate::scan::start_background;
use crate::scan::ScanRequest;
use crate::RecordStream;
use crate::Result;

/// A connected handle to one Aerospike cluster. Cheap to clone: every clone
/// shares the same connection pools, background tend loop and background-job
/// id counter.
#[derive(Clone)]
pub struct Client {
    cluster: ClusterState,
    router: Router,
    tend_handle: Arc<aerospike_runtime::JoinHandle<()>>,
    next_task_id: Arc<AtomicU64>,
}

impl Client {
    /// Resolves the configured seed hosts, performs an initial tend pass, and
    /// spawns the background loop that keeps the partition map current.
    pub async fn connect(config: ClusterConfig) -> Result<Self> {
        let cluster = ClusterState::connect(config).await?;
        let tend_handle = cluster.spawn_tend_loop(aerospike_runtime::io_runtime());
        let router = Router::new(cluster.clone());
        Ok(Client {
            cluster,
            router,
            tend_handle: Arc::new(tend_handle),
            next_task_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn cluster(&self) -> &ClusterState {
        &self.cluster
    }

    /// Stops the background tend loop. The client still works afterwards;
    /// its partition map just stops refreshing.
    pub fn stop_tending(&self) {
        self.tend_handle.cancel();
    }

    pub async fn get(&self, policy: &ReadPolicy, key: &Key, bin_names: &[&str]) -> Result<Option<Record>> {
        let reply = self.router.send(key, &policy.base, || message::read_request(key, bin_names)).await?;
        match reply.header.result_code {
            result_code::KEY_NOT_FOUND => Ok(None),
            _ => {
                message::check_result_code(&reply)?;
                Ok(Some(message::parse_record(&reply)))
            }
        }
    }

    pub async fn exists(&self, policy: &ReadPolicy, key: &Key) -> Result<bool> {
        let reply = self.router.send(key, &policy.base, || message::exists_request(key)).await?;
        match reply.header.result_code {
            result_code::OK => Ok(true),
            result_code::KEY_NOT_FOUND => Ok(false),
            code => Err(error_stack::Report::new(ClientError::server(code, result_code::describe(code)))),
        }
    }

    pub async fn put(&self, policy: &WritePolicy, key: &Key, bins: &[Bin]) -> Result<()> {
        let reply = self.router.send(key, &policy.base, || message::write_request(key, policy, bins)).await?;
        message::check_result_code(&reply)
    }

    /// Returns whether the record existed before the delete.
    pub async fn delete(&self, policy: &WritePolicy, key: &Key) -> Result<bool> {
        let reply = self.router.send(key, &policy.base, || message::delete_request(key, policy)).await?;
        match reply.header.result_code {
            result_code::OK => Ok(true),
            result_code::KEY_NOT_FOUND => Ok(false),
            code => Err(error_stack::Report::new(ClientError::server(code, result_code::describe(code)))),
        }
    }

    /// Resets a record's time-to-live without reading or rewriting its bins.
    pub async fn touch(&self, policy: &WritePolicy, key: &Key) -> Result<()> {
        let reply = self.router.send(key, &policy.base, || message::touch_request(key, policy)).await?;
        message::check_result_code(&reply)
    }

    /// Runs a mixed read/write operation list against one record atomically,
    /// returning whatever the read operations produced.
    pub async fn operate(&self, policy: &WritePolicy, key: &Key, ops: Vec<Operation>) -> Result<Record> {
        let reply = self
            .router
            .send(key, &policy.base, || message::operate_request(key, policy, ops.clone()))
            .await?;
        message::check_result_code(&reply)?;
        Ok(message::parse_record(&reply))
    }

    /// Invokes a registered UDF against one record, returning whatever bins
    /// it chose to write back.
    pub async fn execute_udf(
        &self,
        policy: &WritePolicy,
        key: &Key,
        module: &str,
        function: &str,
        args: Vec<Value>,
    ) -> Result<Record> {
        let mut arg_bytes = Vec::new();
        value_codec::write(&mut arg_bytes, &Value::List(args)).map_err(protocol_err)?;

        let message = move || {
            let mut fields = message::key_fields(key);
            fields.push(Field::new(FieldType::UdfModule, module.as_bytes().to_vec()));
            fields.push(Field::new(FieldType::UdfFunction, function.as_bytes().to_vec()));
            fields.push(Field::new(FieldType::UdfArgList, arg_bytes.clone()));
            Message {
                header: MessageHeader {
                    info2: info2::WRITE,
                    ..Default::default()
                },
                fields,
                ops: vec![],
            }
        };

        let reply = self.router.send(key, &policy.base, message).await?;
        message::check_result_code(&reply)?;
        Ok(message::parse_record(&reply))
    }

    /// Fetches each key independently and concurrently. Per-key errors abort
    /// the whole batch unless `policy.allow_partial_results` is set, in which
    /// case a failed key is reported as missing rather than failing the call.
    pub async fn batch_get(&self, policy: &aerospike_types::BatchPolicy, keys: &[Key], bin_names: &[&str]) -> Result<Vec<Option<Record>>> {
        let read_policy = ReadPolicy { base: policy.base };
        let futures = keys.iter().map(|key| self.get(&read_policy, key, bin_names));
        let results = futures::future::join_all(futures).await;

        if policy.allow_partial_results {
            Ok(results.into_iter().map(|r| r.unwrap_or(None)).collect())
        } else {
            results.into_iter().collect()
        }
    }

    /// Checks each key independently and concurrently. Same partial-results
    /// behavior as [`Client::batch_get`].
    pub async fn batch_exists(&self, policy: &aerospike_types::BatchPolicy, keys: &[Key]) -> Result<Vec<bool>> {
        let read_policy = ReadPolicy { base: policy.base };
        let futures = keys.iter().map(|key| self.exists(&read_policy, key));
        let results = futures::future::join_all(futures).await;

        if policy.allow_partial_results {
            Ok(results.into_iter().map(|r| r.unwrap_or(false)).collect())
        } else {
            results.into_iter().collect()
        }
    }

    /// Runs the same read/write operation list against each key independently
    /// and concurrently. Same partial-results behavior as
    /// [`Client::batch_get`], reporting a failed key as `None`.
    pub async fn batch_operate(&self, policy: &aerospike_types::BatchPolicy, keys: &[Key], ops: Vec<Operation>) -> Result<Vec<Option<Record>>> {
        let write_policy = WritePolicy { base: policy.base, ..Default::default() };
        let futures = keys.iter().map(|key| self.operate(&write_policy, key, ops.clone()));
        let results = futures::future::join_all(futures).await;

        if policy.allow_partial_results {
            Ok(results.into_iter().map(|r| r.ok()).collect())
        } else {
            results.into_iter().map(|r| r.map(Some)).collect()
        }
    }

    /// Streams every record in `namespace`/`set` from every known node,
    /// enforcing `policy`'s `max_records`, `records_per_second`/`priority`
    /// pacing and `concurrent_nodes` dispatch.
    pub async fn scan(&self, policy: &ScanPolicy, namespace: &str, set: &str, bin_names: &[&str]) -> Result<RecordStream> {
        self.scan_with_filter(policy, namespace, set, bin_names, None).await
    }

    /// Like [`Client::scan`], but restricted to `partition_filter` — a subset
    /// of partitions, or a [`PartitionFilter::Resume`] checkpoint captured
    /// from a previous, truncated scan.
    pub async fn scan_with_filter(
        &self,
        policy: &ScanPolicy,
        namespace: &str,
        set: &str,
        bin_names: &[&str],
        partition_filter: Option<PartitionFilter>,
    ) -> Result<RecordStream> {
        start_scan(
            &self.cluster,
            ScanRequest {
                namespace: namespace.to_string(),
                set: set.to_string(),
                bin_names: bin_names.iter().map(|s| s.to_string()).collect(),
                filter: None,
                partition_filter,
                deadline: policy.base.socket_timeout,
                max_records: policy.max_records,
                records_per_second: policy.records_per_second,
                priority: policy.priority,
                concurrent_nodes: policy.concurrent_nodes,
            },
        )
        .await
    }

    /// Dispatches `namespace`/`set` with `ops` as a background scan to every
    /// known node and returns a task id to poll with [`Client::job_wait`],
    /// instead of streaming records back to the caller.
    pub async fn scan_background(&self, policy: &ScanPolicy, namespace: &str, set: &str, ops: Vec<Operation>) -> Result<u64> {
        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let request = ScanRequest {
            namespace: namespace.to_string(),
            set: set.to_string(),
            bin_names: vec![],
            filter: None,
            partition_filter: None,
            deadline: policy.base.socket_timeout,
            max_records: policy.max_records,
            records_per_second: policy.records_per_second,
            priority: policy.priority,
            concurrent_nodes: policy.concurrent_nodes,
        };
        start_background(&self.cluster, request, ops, task_id).await?;
        Ok(task_id)
    }

    /// Streams the records matching a secondary-index filter. `filter_bytes`
    /// is the opaque, already-encoded range/equality predicate for
    /// `index_name`; building that encoding is left to a higher-level query
    /// builder, not this crate.
    pub async fn query(
        &self,
        policy: &QueryPolicy,
        namespace: &str,
        set: &str,
        index_name: &str,
        filter_bytes: Vec<u8>,
        bin_names: &[&str],
    ) -> Result<RecordStream> {
        self.query_with_filter(policy, namespace, set, index_name, filter_bytes, bin_names, None).await
    }

    /// Like [`Client::query`], restricted to `partition_filter`.
    #[allow(clippy::too_many_arguments)]
    pub async fn query_with_filter(
        &self,
        policy: &QueryPolicy,
        namespace: &str,
        set: &str,
        index_name: &str,
        filter_bytes: Vec<u8>,
        bin_names: &[&str],
        partition_filter: Option<PartitionFilter>,
    ) -> Result<RecordStream> {
        start_scan(
            &self.cluster,
            ScanRequest {
                namespace: namespace.to_string(),
                set: set.to_string(),
                bin_names: bin_names.iter().map(|s| s.to_string()).collect(),
                filter: Some((index_name.to_string(), filter_bytes)),
                partition_filter,
                deadline: policy.base.socket_timeout,
                max_records: policy.max_records,
                records_per_second: policy.records_per_second,
                priority: policy.priority,
                concurrent_nodes: policy.concurrent_nodes,
            },
        )
        .await
    }

    /// Dispatches `namespace`/`set` matching the index filter with `ops` as a
    /// background query to every known node, returning a task id to poll with
    /// [`Client::job_wait`].
    pub async fn query_background(
        &self,
        policy: &QueryPolicy,
        namespace: &str,
        set: &str,
        index_name: &str,
        filter_bytes: Vec<u8>,
        ops: Vec<Operation>,
    ) -> Result<u64> {
        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let request = ScanRequest {
            namespace: namespace.to_string(),
            set: set.to_string(),
            bin_names: vec![],
            filter: Some((index_name.to_string(), filter_bytes)),
            partition_filter: None,
            deadline: policy.base.socket_timeout,
            max_records: policy.max_records,
            records_per_second: policy.records_per_second,
            priority: policy.priority,
            concurrent_nodes: policy.concurrent_nodes,
        };
        start_background(&self.cluster, request, ops, task_id).await?;
        Ok(task_id)
    }

    /// Polls every known node's `job-progress:<task_id>` until all report
    /// done or `deadline` elapses.
    pub async fn job_wait(&self, task_id: u64, poll_interval: Duration, deadline: Duration) -> Result<()> {
        let command = format!("job-progress:{task_id}");
        let start = tokio::time::Instant::now();
        loop {
            let reports = self.info_foreach(&[command.as_str()], poll_interval).await?;
            let all_done = reports
                .values()
                .all(|fields| fields.iter().any(|(k, v)| k == &command && v == "status=done"));
            if all_done {
                return Ok(());
            }
            if start.elapsed() >= deadline {
                return Err(error_stack::Report::new(ClientError::timeout("job did not finish before the deadline")));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Sends an info-protocol request directly to one named node, bypassing
    /// the router (info requests aren't keyed to a partition).
    pub async fn info(&self, node_name: &str, names: &[&str], deadline: Duration) -> Result<Vec<(String, String)>> {
        let node = self
            .cluster
            .node(node_name)
            .ok_or_else(|| error_stack::Report::new(ClientError::cluster(format!("unknown node {node_name:?}"))))?;

        let mut conn = node.pool.get().await?;
        let result = info_roundtrip(conn.socket_mut(), names, deadline).await;
        match &result {
            Ok(_) => conn.release(),
            Err(err) if err.current_context().kind() == ErrorKind::Timeout => conn.recover(),
            Err(_) => conn.discard(),
        }
        result
    }

    /// Sends the same info-protocol request to every currently-known node,
    /// keyed by node name. A node that fails is omitted rather than failing
    /// the whole call, since info fan-out is inherently best-effort.
    pub async fn info_foreach(&self, names: &[&str], deadline: Duration) -> Result<std::collections::HashMap<String, Vec<(String, String)>>> {
        let nodes = self.cluster.nodes();
        let futures = nodes.iter().map(|node| async move { (node.name.clone(), self.info(&node.name, names, deadline).await) });
        let results = futures::future::join_all(futures).await;

        Ok(results
            .into_iter()
            .filter_map(|(name, result)| match result {
                Ok(fields) => Some((name, fields)),
                Err(err) => {
                    log::warn!("info_foreach: node {name} did not answer: {err:?}");
                    None
                }
            })
            .collect())
    }

    /// Creates a secondary index over `bin` in `namespace`/`set`, dispatched
    /// to the first known node (index metadata is cluster-wide).
    pub async fn index_create(&self, namespace: &str, set: &str, bin: &str, index_name: &str, index_type: IndexType, deadline: Duration) -> Result<()> {
        self.admin_roundtrip(&admin::index_create_command(namespace, set, bin, index_name, index_type), deadline)
            .await
            .map(|_| ())
    }

    pub async fn index_remove(&self, namespace: &str, index_name: &str, deadline: Duration) -> Result<()> {
        self.admin_roundtrip(&admin::index_remove_command(namespace, index_name), deadline).await.map(|_| ())
    }

    pub async fn udf_put(&self, module_name: &str, content: &[u8], deadline: Duration) -> Result<()> {
        self.admin_roundtrip(&admin::udf_put_command(module_name, content), deadline).await.map(|_| ())
    }

    pub async fn udf_get(&self, module_name: &str, deadline: Duration) -> Result<Vec<u8>> {
        let fields = self.admin_roundtrip(&admin::udf_get_command(module_name), deadline).await?;
        admin::parse_udf_content(&fields)
    }

    pub async fn udf_list(&self, deadline: Duration) -> Result<Vec<String>> {
        let fields = self.admin_roundtrip(&admin::udf_list_command(), deadline).await?;
        Ok(admin::parse_udf_list(&fields))
    }

    pub async fn udf_remove(&self, module_name: &str, deadline: Duration) -> Result<()> {
        self.admin_roundtrip(&admin::udf_remove_command(module_name), deadline).await.map(|_| ())
    }

    pub async fn user_create(&self, username: &str, password: &str, roles: &[&str], deadline: Duration) -> Result<()> {
        self.admin_roundtrip(&admin::user_create_command(username, password, roles), deadline).await.map(|_| ())
    }

    pub async fn user_drop(&self, username: &str, deadline: Duration) -> Result<()> {
        self.admin_roundtrip(&admin::user_drop_command(username), deadline).await.map(|_| ())
    }

    pub async fn grant_roles(&self, username: &str, roles: &[&str], deadline: Duration) -> Result<()> {
        self.admin_roundtrip(&admin::grant_roles_command(username, roles), deadline).await.map(|_| ())
    }

    pub async fn revoke_roles(&self, username: &str, roles: &[&str], deadline: Duration) -> Result<()> {
        self.admin_roundtrip(&admin::revoke_roles_command(username, roles), deadline).await.map(|_| ())
    }

    pub async fn set_password(&self, username: &str, password: &str, deadline: Duration) -> Result<()> {
        self.admin_roundtrip(&admin::set_password_command(username, password), deadline).await.map(|_| ())
    }

    pub async fn query_user(&self, username: &str, deadline: Duration) -> Result<UserInfo> {
        let fields = self.admin_roundtrip(&admin::query_user_command(username), deadline).await?;
        Ok(admin::parse_user_info(username, &fields))
    }

    /// Runs one admin command against the first known node; every admin
    /// command this client issues operates on cluster-wide metadata, so
    /// which node answers it doesn't matter.
    async fn admin_roundtrip(&self, command: &str, deadline: Duration) -> Result<Vec<(String, String)>> {
        let node = self
            .cluster
            .nodes()
            .into_iter()
            .next()
            .ok_or_else(|| error_stack::Report::new(ClientError::cluster("no known node to send an admin command to")))?;

        let mut conn = node.pool.get().await?;
        let result = admin::run_checked(conn.socket_mut(), command, deadline).await;
        match &result {
            Ok(_) => conn.release(),
            Err(err) if err.current_context().kind() == ErrorKind::Timeout => conn.recover(),
            Err(_) => conn.discard(),
        }
        result
    }
}

async fn info_roundtrip(
    socket: &mut aerospike_socket::Socket,
    names: &[&str],
    deadline: Duration,
) -> Result<Vec<(String, String)>> {
    let body = info::encode_request(names);

    let mut header = vec![];
    Envelope {
        kind: EnvelopeType::Info,
        payload_size: body.len() as u64,
    }
    .write(&mut header)
    .map_err(protocol_err)?;

    socket.write_all(&header, deadline).await?;
    socket.write_all(&body, deadline).await?;

    let mut reply_header = [0u8; Envelope::HEADER_SIZE];
    socket.read_exact(&mut reply_header, deadline).await?;
    let mut cursor = std::io::Cursor::new(&reply_header[..]);
    let envelope = Envelope::read(&mut cursor).map_err(protocol_err)?;

    let mut payload = vec![0u8; envelope.payload_size as usize];
    socket.read_exact(&mut payload, deadline).await?;
    info::decode_reply(&payload).map_err(protocol_err)
}

fn protocol_err(err: std::io::Error) -> error_stack::Report<ClientError> {
    error_stack::Report::new(ClientError::network(err.to_string()))
}
