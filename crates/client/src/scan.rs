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

//! Streaming scans and queries. A scan opens one long-lived connection per
//! node and reads record messages off it until the node marks its last one
//! with `info3::LAST`; a query is the same request with `IndexName`/`Filter`
//! fields added, matching how the real wire protocol layers query on top of
//! scan rather than giving it its own envelope type.
//!
//! Every known node is asked, including ones that hold no master partition
//! for the namespace — those simply reply with an immediate empty, last
//! message. Pruning to the actual partition owners would cut the number of
//! connections opened but isn't needed for correctness.

use std::pin::Pin;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use aerospike_cluster::ClusterState;
use aerospike_cluster::Node;
use aerospike_protocol::envelope::Envelope;
use aerospike_protocol::envelope::EnvelopeType;
use aerospike_protocol::fields::Field;
use aerospike_protocol::fields::FieldType;
use aerospike_protocol::message::info1;
use aerospike_protocol::message::info3;
use aerospike_protocol::message::Message;
use aerospike_protocol::message::MessageHeader;
use aerospike_protocol::ops::Operation;
use aerospike_protocol::result_code;
use aerospike_types::ClientError;
use aerospike_types::PartitionFilter;
use aerospike_types::Priority;
use futures::Stream;
use tokio::sync::mpsc;

use crate::message::parse_record;
use crate::Record;
use crate::Result;

/// A handle to an in-flight scan or query. Each item is a record from
/// whichever node produced it next; polling order across nodes is not
/// defined.
pub struct RecordStream {
    receiver: mpsc::Receiver<Result<Record>>,
}

impl Stream for RecordStream {
    type Item = Result<Record>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

pub(crate) struct ScanRequest {
    pub namespace: String,
    pub set: String,
    pub bin_names: Vec<String>,
    pub filter: Option<(String, Vec<u8>)>,
    pub partition_filter: Option<PartitionFilter>,
    pub deadline: Duration,
    pub max_records: u64,
    pub records_per_second: u32,
    pub priority: Priority,
    pub concurrent_nodes: bool,
}

/// A request's per-record pacing and best-effort total cap, shared by every
/// node task dispatched for one scan/query so `max_records` bounds the sum
/// across nodes rather than being applied per node.
struct Budget {
    remaining: Option<AtomicU64>,
    delay_between_records: Duration,
}

impl Budget {
    fn new(request: &ScanRequest) -> Arc<Self> {
        let records_per_second = if request.records_per_second > 0 {
            request.records_per_second
        } else {
            // Priority has no wire representation the server understands here,
            // so it's expressed as a client-side pacing default instead.
            match request.priority {
                Priority::Low => 200,
                Priority::Medium => 1_000,
                Priority::Default | Priority::High => 0,
            }
        };
        let delay_between_records = if records_per_second > 0 {
            Duration::from_secs_f64(1.0 / records_per_second as f64)
        } else {
            Duration::ZERO
        };
        Arc::new(Budget {
            remaining: (request.max_records > 0).then(|| AtomicU64::new(request.max_records)),
            delay_between_records,
        })
    }

    /// Reserves one slot of the remaining record budget. Returns `false` once
    /// the cap has been reached, at which point the caller should keep
    /// draining the stream without forwarding any more records.
    fn take_one(&self) -> bool {
        match &self.remaining {
            None => true,
            Some(remaining) => remaining
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| (n > 0).then_some(n - 1))
                .is_ok(),
        }
    }
}

pub(crate) async fn start(cluster: &ClusterState, request: ScanRequest) -> Result<RecordStream> {
    let nodes = cluster.nodes();
    let (tx, rx) = mpsc::channel(128);
    let budget = Budget::new(&request);
    let concurrent_nodes = request.concurrent_nodes;

    let dispatch = nodes.into_iter().map(|node| {
        let tx = tx.clone();
        let namespace = request.namespace.clone();
        let set = request.set.clone();
        let bin_names = request.bin_names.clone();
        let filter = request.filter.clone();
        let partition_filter = request.partition_filter.clone();
        let deadline = request.deadline;
        let budget = budget.clone();
        async move {
            if let Err(err) = scan_one_node(&node, &namespace, &set, &bin_names, filter, partition_filter, deadline, &budget, &tx).await {
                let _ = tx.send(Err(err)).await;
            }
        }
    });

    if concurrent_nodes {
        for task in dispatch {
            aerospike_runtime::io_runtime().spawn(task);
        }
    } else {
        // ScanPolicy::concurrent_nodes == false: ask one node at a time so the
        // cluster never has more than one of this scan's connections open.
        aerospike_runtime::io_runtime().spawn(async move {
            for task in dispatch {
                task.await;
            }
        });
    }
    drop(tx);

    Ok(RecordStream { receiver: rx })
}

#[allow(clippy::too_many_arguments)]
async fn scan_one_node(
    node: &Node,
    namespace: &str,
    set: &str,
    bin_names: &[String],
    filter: Option<(String, Vec<u8>)>,
    partition_filter: Option<PartitionFilter>,
    deadline: Duration,
    budget: &Budget,
    tx: &mpsc::Sender<Result<Record>>,
) -> Result<()> {
    let mut conn = node.pool.get().await?;
    let request = build_request(namespace, set, bin_names, filter, partition_filter);
    let result = run_scan_session(conn.socket_mut(), &request, deadline, budget, tx).await;

    match &result {
        Ok(()) => conn.release(),
        Err(err) if err.current_context().kind() == aerospike_types::ErrorKind::Timeout => conn.recover(),
        Err(_) => conn.discard(),
    }
    result
}

/// Writes the scan request and reads records off `socket` until the node's
/// own `info3::LAST`, forwarding each to `tx`. Keeps draining after the
/// consumer drops its receiver, or after `budget`'s cap is reached, instead
/// of stopping mid-stream, so whatever calls this always gets to leave the
/// connection at a clean message boundary.
async fn run_scan_session(
    socket: &mut aerospike_socket::Socket,
    request: &Message,
    deadline: Duration,
    budget: &Budget,
    tx: &mpsc::Sender<Result<Record>>,
) -> Result<()> {
    let mut body = Vec::with_capacity(request.calculate_size());
    request.write(&mut body).map_err(protocol_err)?;

    let mut header = vec![];
    Envelope {
        kind: EnvelopeType::Record,
        payload_size: body.len() as u64,
    }
    .write(&mut header)
    .map_err(protocol_err)?;

    socket.write_all(&header, deadline).await?;
    socket.write_all(&body, deadline).await?;

    let mut consumer_dropped = false;

    loop {
        let mut reply_header = [0u8; Envelope::HEADER_SIZE];
        socket.read_exact(&mut reply_header, deadline).await?;
        let mut cursor = std::io::Cursor::new(&reply_header[..]);
        let envelope = Envelope::read(&mut cursor).map_err(protocol_err)?;

        let mut payload = vec![0u8; envelope.payload_size as usize];
        socket.read_exact(&mut payload, deadline).await?;
        let mut cursor = std::io::Cursor::new(payload);
        let message = Message::read(&mut cursor).map_err(protocol_err)?;

        let is_last = message.header.info3 & info3::LAST != 0;

        if message.header.result_code != result_code::OK {
            if !consumer_dropped && message.header.result_code != result_code::QUERY_END {
                let code = message.header.result_code;
                let _ = tx
                    .send(Err(error_stack::Report::new(ClientError::server(code, result_code::describe(code)))))
                    .await;
            }
            break;
        }

        if !consumer_dropped && !message.ops.is_empty() {
            if !budget.take_one() {
                consumer_dropped = true;
            } else {
                let record = parse_record(&message);
                if tx.send(Ok(record)).await.is_err() {
                    consumer_dropped = true;
                } else if !budget.delay_between_records.is_zero() {
                    tokio::time::sleep(budget.delay_between_records).await;
                }
            }
        }

        if is_last {
            break;
        }
    }

    Ok(())
}

fn build_request(namespace: &str, set: &str, bin_names: &[String], filter: Option<(String, Vec<u8>)>, partition_filter: Option<PartitionFilter>) -> Message {
    let fields = base_fields(namespace, set, filter, partition_filter);
    let info1_bits = if bin_names.is_empty() { info1::READ | info1::GET_ALL } else { info1::READ };
    let ops = bin_names.iter().map(|name| Operation::read(name.clone())).collect();

    Message {
        header: MessageHeader {
            info1: info1_bits,
            ..Default::default()
        },
        fields,
        ops,
    }
}

fn base_fields(namespace: &str, set: &str, filter: Option<(String, Vec<u8>)>, partition_filter: Option<PartitionFilter>) -> Vec<Field> {
    let mut fields = vec![Field::namespace(namespace)];
    if !set.is_empty() {
        fields.push(Field::set_name(set));
    }
    if let Some((index_name, filter_bytes)) = filter {
        fields.push(Field::new(FieldType::IndexName, index_name.into_bytes()));
        fields.push(Field::new(FieldType::Filter, filter_bytes));
    }
    if let Some(partition_filter) = &partition_filter {
        fields.push(Field::partition_filter(partition_filter));
    }
    fields
}

/// Builds the request for a background scan/query: unlike a foreground scan,
/// its ops are the caller's actual write/UDF operations, not read ops derived
/// from a bin-name list.
fn build_background_request(
    namespace: &str,
    set: &str,
    filter: Option<(String, Vec<u8>)>,
    partition_filter: Option<PartitionFilter>,
    ops: Vec<Operation>,
    task_id: u64,
) -> Message {
    let mut fields = base_fields(namespace, set, filter, partition_filter);
    fields.push(Field::new(FieldType::JobId, task_id.to_be_bytes().to_vec()));

    Message {
        header: MessageHeader {
            info1: info1::BACKGROUND,
            ..Default::default()
        },
        fields,
        ops,
    }
}

/// Dispatches a background scan/query to every known node and returns
/// immediately with the caller's own task id, not waiting for the nodes to
/// finish: progress is polled separately via [`crate::Client::job_wait`].
pub(crate) async fn start_background(cluster: &ClusterState, request: ScanRequest, ops: Vec<Operation>, task_id: u64) -> Result<()> {
    let nodes = cluster.nodes();

    for node in nodes {
        let request_message = build_background_request(
            &request.namespace,
            &request.set,
            request.filter.clone(),
            request.partition_filter.clone(),
            ops.clone(),
            task_id,
        );
        let mut conn = node.pool.get().await?;
        let result = run_background_dispatch(conn.socket_mut(), &request_message, request.deadline).await;
        match &result {
            Ok(()) => conn.release(),
            Err(err) if err.current_context().kind() == aerospike_types::ErrorKind::Timeout => conn.recover(),
            Err(_) => conn.discard(),
        }
        result?;
    }
    Ok(())
}

async fn run_background_dispatch(socket: &mut aerospike_socket::Socket, request: &Message, deadline: Duration) -> Result<()> {
    let mut body = Vec::with_capacity(request.calculate_size());
    request.write(&mut body).map_err(protocol_err)?;

    let mut header = vec![];
    Envelope {
        kind: EnvelopeType::Record,
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
    let reply = Message::read(&mut std::io::Cursor::new(payload)).map_err(protocol_err)?;

    if reply.header.result_code != result_code::OK {
        let code = reply.header.result_code;
        return Err(error_stack::Report::new(ClientError::server(code, result_code::describe(code))));
    }
    Ok(())
}

fn protocol_err(err: std::io::Error) -> error_stack::Report<ClientError> {
    error_stack::Report::new(ClientError::network(err.to_string()))
}
