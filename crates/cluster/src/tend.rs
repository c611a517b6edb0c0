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

//! One tend pass: ask a node for its identity, peers and per-namespace
//! partition ownership, using the info sub-protocol. The wire shape of each
//! command's reply is ours to define (`aerospike-protocol::info` just carries
//! `name\tvalue` lines) and is mirrored by `test-toolkit`'s fake node.

use std::net::SocketAddr;

use aerospike_protocol::envelope::Envelope;
use aerospike_protocol::envelope::EnvelopeType;
use aerospike_protocol::info;
use aerospike_socket::Socket;
use aerospike_types::ClientError;

use crate::partition::PartitionTable;

pub struct TendReport {
    pub node_name: String,
    pub peers: Vec<(String, SocketAddr)>,
    /// `(namespace, partition_table)` pairs this node reported ownership for.
    pub partitions: Vec<(String, PartitionTable)>,
}

pub async fn tend(socket: &mut Socket, deadline: std::time::Duration) -> error_stack::Result<TendReport, ClientError> {
    let request = info::encode_request(&["node", "peers", "namespaces"]);
    let reply = request_info(socket, &request, deadline).await?;
    let fields = info::decode_reply(&reply).map_err(protocol_err)?;

    let node_name = field_required(&fields, "node")?;
    let peers = parse_peers(&field(&fields, "peers").unwrap_or_default());
    let namespaces: Vec<String> = field(&fields, "namespaces")
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();

    let mut partitions = Vec::new();
    for ns in namespaces {
        let command = format!("partitions:namespace={ns}");
        let request = info::encode_request(&[&command]);
        let reply = request_info(socket, &request, deadline).await?;
        let ns_fields = info::decode_reply(&reply).map_err(protocol_err)?;
        if let Some(value) = ns_fields.iter().find(|(k, _)| k == &command).map(|(_, v)| v.clone()) {
            partitions.push((ns, parse_partition_table(&value)));
        }
    }

    Ok(TendReport {
        node_name,
        peers,
        partitions,
    })
}

async fn request_info(
    socket: &mut Socket,
    body: &[u8],
    deadline: std::time::Duration,
) -> error_stack::Result<Vec<u8>, ClientError> {
    let mut header = vec![];
    Envelope {
        kind: EnvelopeType::Info,
        payload_size: body.len() as u64,
    }
    .write(&mut header)
    .map_err(protocol_err)?;

    socket.write_all(&header, deadline).await?;
    socket.write_all(body, deadline).await?;

    let mut reply_header = [0u8; Envelope::HEADER_SIZE];
    socket.read_exact(&mut reply_header, deadline).await?;
    let mut cursor = std::io::Cursor::new(&reply_header[..]);
    let envelope = Envelope::read(&mut cursor).map_err(protocol_err)?;

    let mut payload = vec![0u8; envelope.payload_size as usize];
    socket.read_exact(&mut payload, deadline).await?;
    Ok(payload)
}

fn field(fields: &[(String, String)], name: &str) -> Option<String> {
    fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
}

fn parse_peers(text: &str) -> Vec<(String, SocketAddr)> {
    text.split(';')
        .filter(|s| !s.is_empty())
        .filter_map(|entry| {
            let (name, addr) = entry.split_once(',')?;
            let addr: SocketAddr = addr.parse().ok()?;
            Some((name.to_string(), addr))
        })
        .collect()
}

/// `partition_id:role=node_name,...` where `role` is `0` for master and `1..`
/// for replica rank.
fn parse_partition_table(text: &str) -> PartitionTable {
    let mut table = PartitionTable::empty();
    for entry in text.split(',').filter(|s| !s.is_empty()) {
        let Some((key, node_name)) = entry.split_once('=') else {
            continue;
        };
        let Some((partition_id, role)) = key.split_once(':') else {
            continue;
        };
        let (Ok(partition_id), Ok(role)) = (partition_id.parse::<u16>(), role.parse::<usize>()) else {
            continue;
        };
        if role == 0 {
            table.set_master(partition_id, node_name.to_string());
        } else {
            table.set_replica(partition_id, role, node_name.to_string());
        }
    }
    table
}

fn protocol_err(err: std::io::Error) -> error_stack::Report<ClientError> {
    error_stack::Report::new(ClientError::cluster(err.to_string()))
}

fn field_required(fields: &[(String, String)], name: &str) -> error_stack::Result<String, ClientError> {
    field(fields, name).ok_or_else(|| error_stack::Report::new(ClientError::cluster(format!("info reply missing {name:?}"))))
}
