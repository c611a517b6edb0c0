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

//! An in-process fake Aerospike node: enough of the wire protocol (info
//! sub-protocol, single-record get/put/delete/touch/operate, scan,
//! background scan/query, admin commands) to drive the client end to end
//! without a real cluster. By default it claims every partition of every
//! namespace it's asked about, which is right for a single-node test
//! cluster; [`FakeNode::start_with_partitions`] lets a multi-node test
//! assign a subset instead, so routing and failover across nodes is
//! actually exercised.

use std::collections::HashMap;
use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;

use aerospike_protocol::envelope::Envelope;
use aerospike_protocol::envelope::EnvelopeType;
use aerospike_protocol::fields::FieldType;
use aerospike_protocol::message::info1;
use aerospike_protocol::message::info2;
use aerospike_protocol::message::info3;
use aerospike_protocol::message::Message;
use aerospike_protocol::message::MessageHeader;
use aerospike_protocol::ops::Operation;
use aerospike_protocol::ops::OperatorType;
use aerospike_protocol::result_code;
use aerospike_types::Bin;
use aerospike_types::N_PARTITIONS;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::Notify;

#[derive(Clone)]
struct StoredRecord {
    set: String,
    generation: u32,
    ttl: u32,
    bins: Vec<Bin>,
}

type Store = Arc<Mutex<HashMap<(String, [u8; 20]), StoredRecord>>>;

/// Background job ids this node has finished. The fake node runs a
/// background scan/query to completion synchronously, so an id lands here
/// the moment its dispatch request is served.
type Jobs = Arc<Mutex<HashSet<u64>>>;

/// In-memory admin state: secondary indexes, UDF modules and users/roles.
/// Enough to round-trip the admin commands end to end in tests without
/// enforcing any of it against reads and writes.
#[derive(Default)]
struct AdminState {
    indexes: HashSet<String>,
    udfs: HashMap<String, Vec<u8>>,
    users: HashMap<String, (String, Vec<String>)>,
}

type Admin = Arc<Mutex<AdminState>>;

/// A running fake node. Dropping the handle does not stop it; call
/// [`FakeNode::shutdown`] explicitly.
pub struct FakeNode {
    pub addr: SocketAddr,
    node_name: String,
    store: Store,
    jobs: Jobs,
    admin: Admin,
    shutdown: Arc<Notify>,
}

impl FakeNode {
    pub async fn start(node_name: impl Into<String>) -> io::Result<Self> {
        Self::start_with_partitions(node_name, (0..N_PARTITIONS).collect()).await
    }

    /// Like [`FakeNode::start`], but the node only claims `partitions`
    /// (instead of every partition in the namespace) when asked for its
    /// partition ownership — the shape a multi-node cluster actually has.
    pub async fn start_with_partitions(node_name: impl Into<String>, partitions: Vec<u16>) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let node_name = node_name.into();
        let store: Store = Arc::new(Mutex::new(HashMap::new()));
        let jobs: Jobs = Arc::new(Mutex::new(HashSet::new()));
        let admin: Admin = Arc::new(Mutex::new(AdminState::default()));
        let shutdown = Arc::new(Notify::new());
        let partitions: Arc<Vec<u16>> = Arc::new(partitions);

        let accept_store = store.clone();
        let accept_jobs = jobs.clone();
        let accept_admin = admin.clone();
        let accept_name = node_name.clone();
        let accept_shutdown = shutdown.clone();
        let accept_partitions = partitions.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { break };
                        let store = accept_store.clone();
                        let jobs = accept_jobs.clone();
                        let admin = accept_admin.clone();
                        let name = accept_name.clone();
                        let partitions = accept_partitions.clone();
                        tokio::spawn(async move {
                            if let Err(err) = serve_connection(stream, store, jobs, admin, name, partitions).await {
                                log::debug!("fake node connection ended: {err}");
                            }
                        });
                    }
                    _ = accept_shutdown.notified() => break,
                }
            }
        });

        Ok(FakeNode {
            addr,
            node_name,
            store,
            jobs,
            admin,
            shutdown,
        })
    }

    pub fn seed_host(&self) -> String {
        self.addr.to_string()
    }

    pub fn name(&self) -> &str {
        &self.node_name
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    pub fn record_count(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    /// Seeds a record directly, bypassing the wire protocol, for test setup.
    pub fn seed(&self, namespace: &str, set: &str, digest: [u8; 20], bins: Vec<Bin>) {
        self.store.lock().unwrap().insert(
            (namespace.to_string(), digest),
            StoredRecord {
                set: set.to_string(),
                generation: 1,
                ttl: 0,
                bins,
            },
        );
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    store: Store,
    jobs: Jobs,
    admin: Admin,
    node_name: String,
    partitions: Arc<Vec<u16>>,
) -> io::Result<()> {
    loop {
        let mut header = [0u8; Envelope::HEADER_SIZE];
        if stream.read_exact(&mut header).await.is_err() {
            return Ok(());
        }
        let mut cursor = io::Cursor::new(&header[..]);
        let envelope = Envelope::read(&mut cursor).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut payload = vec![0u8; envelope.payload_size as usize];
        stream.read_exact(&mut payload).await?;

        match envelope.kind {
            EnvelopeType::Info => serve_info(&mut stream, &payload, &node_name, &partitions, &jobs).await?,
            EnvelopeType::Record => serve_record(&mut stream, &payload, &store, &jobs).await?,
            EnvelopeType::Admin => serve_admin(&mut stream, &payload, &admin).await?,
            EnvelopeType::Compressed => {
                // not modeled by the fake node; close the connection rather than hang.
                return Ok(());
            }
        }
    }
}

async fn write_envelope(stream: &mut TcpStream, kind: EnvelopeType, body: &[u8]) -> io::Result<()> {
    let mut header = vec![];
    Envelope {
        kind,
        payload_size: body.len() as u64,
    }
    .write(&mut header)
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    stream.write_all(&header).await?;
    stream.write_all(body).await
}

async fn serve_info(stream: &mut TcpStream, payload: &[u8], node_name: &str, partitions: &[u16], jobs: &Jobs) -> io::Result<()> {
    let text = String::from_utf8_lossy(payload);
    let mut lines = Vec::new();
    for command in text.lines().filter(|l| !l.is_empty()) {
        let value = if command == "node" {
            node_name.to_string()
        } else if command == "peers" {
            String::new()
        } else if command == "namespaces" {
            "test".to_string()
        } else if let Some(namespace) = command.strip_prefix("partitions:namespace=") {
            let _ = namespace;
            owned_partitions(node_name, partitions)
        } else if let Some(id) = command.strip_prefix("job-progress:") {
            let done = id.parse::<u64>().map(|id| jobs.lock().unwrap().contains(&id)).unwrap_or(false);
            if done { "status=done".to_string() } else { "status=in-progress".to_string() }
        } else {
            String::new()
        };
        lines.push(format!("{command}\t{value}"));
    }
    let mut body = lines.join("\n");
    if !lines.is_empty() {
        body.push('\n');
    }
    write_envelope(stream, EnvelopeType::Info, body.as_bytes()).await
}

async fn serve_admin(stream: &mut TcpStream, payload: &[u8], admin: &Admin) -> io::Result<()> {
    let command = String::from_utf8_lossy(payload);
    let command = command.lines().next().unwrap_or_default();
    let args: HashMap<&str, &str> = command
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(k, _)| *k != "op")
        .collect();
    let op = command.strip_prefix("op=").and_then(|rest| rest.split(';').next()).unwrap_or_default();

    let mut fields = vec![("status".to_string(), "ok".to_string())];
    let mut guard = admin.lock().unwrap();
    match op {
        "index-create" => {
            guard.indexes.insert(args["indexname"].to_string());
        }
        "index-remove" => {
            guard.indexes.remove(args["indexname"]);
        }
        "udf-put" => {
            let content = BASE64_STANDARD.decode(args["content"]).unwrap_or_default();
            guard.udfs.insert(args["filename"].to_string(), content);
        }
        "udf-get" => match guard.udfs.get(args["filename"]) {
            Some(content) => fields.push(("content".to_string(), BASE64_STANDARD.encode(content))),
            None => fields = vec![("status".to_string(), "not-found".to_string())],
        },
        "udf-list" => {
            fields.push(("filename".to_string(), guard.udfs.keys().cloned().collect::<Vec<_>>().join(",")));
        }
        "udf-remove" => {
            guard.udfs.remove(args["filename"]);
        }
        "user-create" => {
            let roles = args.get("roles").unwrap_or(&"").split(',').filter(|r| !r.is_empty()).map(str::to_string).collect();
            guard.users.insert(args["user"].to_string(), (args["password"].to_string(), roles));
        }
        "user-drop" => {
            guard.users.remove(args["user"]);
        }
        "grant-roles" => {
            if let Some((_, roles)) = guard.users.get_mut(args["user"]) {
                for role in args.get("roles").unwrap_or(&"").split(',').filter(|r| !r.is_empty()) {
                    if !roles.iter().any(|r| r == role) {
                        roles.push(role.to_string());
                    }
                }
            }
        }
        "revoke-roles" => {
            if let Some((_, roles)) = guard.users.get_mut(args["user"]) {
                let revoked: HashSet<&str> = args.get("roles").unwrap_or(&"").split(',').collect();
                roles.retain(|r| !revoked.contains(r.as_str()));
            }
        }
        "set-password" => {
            if let Some((password, _)) = guard.users.get_mut(args["user"]) {
                *password = args["password"].to_string();
            }
        }
        "query-user" => match guard.users.get(args["user"]) {
            Some((_, roles)) => fields.push(("roles".to_string(), roles.join(","))),
            None => fields = vec![("status".to_string(), "not-found".to_string())],
        },
        _ => fields = vec![("status".to_string(), "unknown-op".to_string())],
    }
    drop(guard);

    let body = fields.into_iter().map(|(k, v)| format!("{k}\t{v}")).collect::<Vec<_>>().join("\n") + "\n";
    write_envelope(stream, EnvelopeType::Admin, body.as_bytes()).await
}

fn owned_partitions(node_name: &str, partitions: &[u16]) -> String {
    partitions.iter().map(|id| format!("{id}:0={node_name}")).collect::<Vec<_>>().join(",")
}

async fn serve_record(stream: &mut TcpStream, payload: &[u8], store: &Store, jobs: &Jobs) -> io::Result<()> {
    let mut cursor = io::Cursor::new(payload);
    let request = Message::read(&mut cursor).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let namespace = field_str(&request, FieldType::Namespace).unwrap_or_default();
    let set = field_str(&request, FieldType::SetName).unwrap_or_default();
    let digest = field_digest(&request);

    let replies = if request.header.info1 & info1::BACKGROUND != 0 {
        vec![serve_background(&request, store, namespace, set, jobs)]
    } else {
        match digest {
            Some(digest) => vec![serve_single_record(&request, store, namespace, set, digest)],
            None => serve_scan(&request, store, namespace, set),
        }
    };

    for reply in replies {
        let mut body = Vec::with_capacity(reply.calculate_size());
        reply.write(&mut body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        write_envelope(stream, EnvelopeType::Record, &body).await?;
    }
    Ok(())
}

/// Runs a background scan/query to completion synchronously: applies the
/// request's write ops to every matching record, marks the attached job id
/// done, and replies once with `info3::LAST` already set (no streaming).
fn serve_background(request: &Message, store: &Store, namespace: String, set: String, jobs: &Jobs) -> Message {
    let job_id = request
        .fields
        .iter()
        .find(|f| f.kind == FieldType::JobId)
        .filter(|f| f.data.len() == 8)
        .map(|f| u64::from_be_bytes(f.data[..8].try_into().unwrap()));

    let writes: Vec<&Operation> = request.ops.iter().filter(|op| op.op == OperatorType::Write).collect();
    if !writes.is_empty() {
        let mut guard = store.lock().unwrap();
        let matching: Vec<(String, [u8; 20])> = guard
            .iter()
            .filter(|((ns, _), record)| *ns == namespace && (set.is_empty() || record.set == set))
            .map(|(key, _)| key.clone())
            .collect();
        for key in matching {
            let record = guard.get_mut(&key).unwrap();
            for op in &writes {
                if let Some(bin) = record.bins.iter_mut().find(|b| b.name == op.bin_name) {
                    bin.value = op.value.clone();
                } else {
                    record.bins.push(Bin {
                        name: op.bin_name.clone(),
                        value: op.value.clone(),
                    });
                }
            }
            record.generation += 1;
        }
    }

    if let Some(job_id) = job_id {
        jobs.lock().unwrap().insert(job_id);
    }

    Message {
        header: reply_header(result_code::OK),
        fields: vec![],
        ops: vec![],
    }
}

fn field_str(message: &Message, kind: FieldType) -> Option<String> {
    message
        .fields
        .iter()
        .find(|f| f.kind == kind)
        .map(|f| String::from_utf8_lossy(&f.data).into_owned())
}

fn field_digest(message: &Message) -> Option<[u8; 20]> {
    let field = message.fields.iter().find(|f| f.kind == FieldType::Digest)?;
    let mut digest = [0u8; 20];
    if field.data.len() != 20 {
        return None;
    }
    digest.copy_from_slice(&field.data);
    Some(digest)
}

fn reply_header(result_code: i8) -> MessageHeader {
    MessageHeader {
        result_code,
        info3: info3::LAST,
        ..Default::default()
    }
}

fn serve_single_record(request: &Message, store: &Store, namespace: String, set: String, digest: [u8; 20]) -> Message {
    let key = (namespace.clone(), digest);
    let is_write = request.header.info2 & info2::WRITE != 0;
    let is_delete = request.header.info2 & info2::DELETE != 0;

    if is_write && is_delete {
        let existed = store.lock().unwrap().remove(&key).is_some();
        let code = if existed { result_code::OK } else { result_code::KEY_NOT_FOUND };
        return Message {
            header: reply_header(code),
            fields: vec![],
            ops: vec![],
        };
    }

    if is_write {
        return serve_write(request, store, key, set);
    }

    serve_read(request, store, &key)
}

fn serve_write(request: &Message, store: &Store, key: (String, [u8; 20]), set: String) -> Message {
    let mut guard = store.lock().unwrap();
    let existing = guard.get(&key).cloned();

    if request.header.info2 & info2::CREATE_ONLY != 0 && existing.is_some() {
        return Message {
            header: reply_header(result_code::KEY_EXISTS_ERROR),
            fields: vec![],
            ops: vec![],
        };
    }
    if request.header.info3 & info3::UPDATE_ONLY != 0 && existing.is_none() {
        return Message {
            header: reply_header(result_code::KEY_NOT_FOUND),
            fields: vec![],
            ops: vec![],
        };
    }
    if request.header.info3 & info3::REPLACE_ONLY != 0 && existing.is_none() {
        return Message {
            header: reply_header(result_code::KEY_NOT_FOUND),
            fields: vec![],
            ops: vec![],
        };
    }

    let current_generation = existing.as_ref().map(|r| r.generation).unwrap_or(0);
    if request.header.info2 & info2::GENERATION != 0 && current_generation != request.header.generation {
        return Message {
            header: reply_header(result_code::GENERATION_ERROR),
            fields: vec![],
            ops: vec![],
        };
    }
    if request.header.info2 & info2::GENERATION_GT != 0 && current_generation <= request.header.generation {
        return Message {
            header: reply_header(result_code::GENERATION_ERROR),
            fields: vec![],
            ops: vec![],
        };
    }

    // A touch is the single-op, nil-value marker `Operation::touch()`; it only
    // refreshes metadata and requires the record to already exist.
    let is_touch = request.ops.len() == 1 && request.ops[0].op == OperatorType::Touch;
    if is_touch && existing.is_none() {
        return Message {
            header: reply_header(result_code::KEY_NOT_FOUND),
            fields: vec![],
            ops: vec![],
        };
    }

    let mut bins = existing.as_ref().map(|r| r.bins.clone()).unwrap_or_default();
    if !is_touch {
        for op in &request.ops {
            if op.op != OperatorType::Write {
                continue;
            }
            if let Some(bin) = bins.iter_mut().find(|b| b.name == op.bin_name) {
                bin.value = op.value.clone();
            } else {
                bins.push(Bin {
                    name: op.bin_name.clone(),
                    value: op.value.clone(),
                });
            }
        }
    }

    let read_back: Vec<Operation> = request
        .ops
        .iter()
        .filter(|op| op.op == OperatorType::Read)
        .filter_map(|op| bins.iter().find(|b| b.name == op.bin_name))
        .map(|bin| Operation::write(bin.name.clone(), bin.value.clone()))
        .collect();

    let generation = current_generation + 1;
    guard.insert(
        key,
        StoredRecord {
            set,
            generation,
            ttl: request.header.record_ttl,
            bins,
        },
    );

    Message {
        header: MessageHeader {
            result_code: result_code::OK,
            generation,
            record_ttl: request.header.record_ttl,
            info3: info3::LAST,
            ..Default::default()
        },
        fields: vec![],
        ops: read_back,
    }
}

fn serve_read(request: &Message, store: &Store, key: &(String, [u8; 20])) -> Message {
    let guard = store.lock().unwrap();
    let Some(record) = guard.get(key) else {
        return Message {
            header: reply_header(result_code::KEY_NOT_FOUND),
            fields: vec![],
            ops: vec![],
        };
    };

    let no_bin_data = request.header.info1 & info1::NOBINDATA != 0;
    let ops = if no_bin_data {
        vec![]
    } else if request.ops.is_empty() {
        record.bins.iter().map(|bin| Operation::write(bin.name.clone(), bin.value.clone())).collect()
    } else {
        request
            .ops
            .iter()
            .filter_map(|op| record.bins.iter().find(|bin| bin.name == op.bin_name))
            .map(|bin| Operation::write(bin.name.clone(), bin.value.clone()))
            .collect()
    };

    Message {
        header: MessageHeader {
            result_code: result_code::OK,
            generation: record.generation,
            record_ttl: record.ttl,
            info3: info3::LAST,
            ..Default::default()
        },
        fields: vec![],
        ops,
    }
}

fn serve_scan(request: &Message, store: &Store, namespace: String, set: String) -> Vec<Message> {
    let guard = store.lock().unwrap();
    let bin_names: Vec<&str> = request.ops.iter().map(|op| op.bin_name.as_str()).collect();

    let mut replies: Vec<Message> = guard
        .iter()
        .filter(|((ns, _), record)| *ns == namespace && (set.is_empty() || record.set == set))
        .map(|(_, record)| {
            let ops = if bin_names.is_empty() {
                record.bins.clone()
            } else {
                record.bins.iter().filter(|bin| bin_names.contains(&bin.name.as_str())).cloned().collect()
            }
            .into_iter()
            .map(|bin| Operation::write(bin.name, bin.value))
            .collect();

            Message {
                header: MessageHeader {
                    result_code: result_code::OK,
                    generation: record.generation,
                    record_ttl: record.ttl,
                    ..Default::default()
                },
                fields: vec![],
                ops,
            }
        })
        .collect();

    replies.push(Message {
        header: MessageHeader {
            result_code: result_code::OK,
            info3: info3::LAST,
            ..Default::default()
        },
        fields: vec![],
        ops: vec![],
    });
    replies
}

#[cfg(test)]
mod tests {
    use aerospike_types::Value;

    use super::*;

    #[tokio::test]
    async fn info_reports_node_identity_and_full_ownership() {
        let node = FakeNode::start("BB9020011AC4202").await.unwrap();
        let mut stream = TcpStream::connect(node.addr).await.unwrap();

        let body = aerospike_protocol::info::encode_request(&["node", "namespaces"]);
        write_envelope(&mut stream, EnvelopeType::Info, &body).await.unwrap();

        let mut header = [0u8; Envelope::HEADER_SIZE];
        stream.read_exact(&mut header).await.unwrap();
        let mut cursor = io::Cursor::new(&header[..]);
        let envelope = Envelope::read(&mut cursor).unwrap();
        let mut payload = vec![0u8; envelope.payload_size as usize];
        stream.read_exact(&mut payload).await.unwrap();

        let reply = aerospike_protocol::info::decode_reply(&payload).unwrap();
        assert!(reply.iter().any(|(k, v)| k == "node" && v == "BB9020011AC4202"));
    }

    #[tokio::test]
    async fn put_then_get_round_trips_through_the_wire() {
        let node = FakeNode::start("n1").await.unwrap();
        let mut stream = TcpStream::connect(node.addr).await.unwrap();

        let digest = [7u8; 20];
        let write_request = Message {
            header: MessageHeader {
                info2: info2::WRITE,
                ..Default::default()
            },
            fields: vec![
                aerospike_protocol::fields::Field::namespace("test"),
                aerospike_protocol::fields::Field::digest(&digest),
            ],
            ops: vec![Operation::write("a", Value::Integer(9))],
        };
        let mut body = vec![];
        write_request.write(&mut body).unwrap();
        write_envelope(&mut stream, EnvelopeType::Record, &body).await.unwrap();

        let mut header = [0u8; Envelope::HEADER_SIZE];
        stream.read_exact(&mut header).await.unwrap();
        let mut cursor = io::Cursor::new(&header[..]);
        let envelope = Envelope::read(&mut cursor).unwrap();
        let mut payload = vec![0u8; envelope.payload_size as usize];
        stream.read_exact(&mut payload).await.unwrap();
        let reply = Message::read(&mut io::Cursor::new(payload)).unwrap();
        assert_eq!(reply.header.result_code, result_code::OK);
        assert_eq!(node.record_count(), 1);
    }
}
