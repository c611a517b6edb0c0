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

//! Picks the node responsible for a key's partition, sends a record message
//! over a pooled connection, and retries the whole round trip according to a
//! [`BasePolicy`] when the failure is one the server or network can recover
//! from on a second try.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use aerospike_cluster::ClusterState;
use aerospike_protocol::compression;
use aerospike_protocol::envelope::Envelope;
use aerospike_protocol::envelope::EnvelopeType;
use aerospike_protocol::fuzz::maybe_corrupt;
use aerospike_protocol::message::Message;
use aerospike_types::partition_id;
use aerospike_types::BasePolicy;
use aerospike_types::ClientError;
use aerospike_types::ErrorKind;
use aerospike_types::Key;
use aerospike_types::Replica;
use backon::ConstantBuilder;
use backon::Retryable;

/// Routes record messages to the right node and retries them per policy.
#[derive(Clone)]
pub struct Router {
    cluster: ClusterState,
    round_robin: std::sync::Arc<AtomicUsize>,
}

impl Router {
    pub fn new(cluster: ClusterState) -> Self {
        Router {
            cluster,
            round_robin: std::sync::Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn cluster(&self) -> &ClusterState {
        &self.cluster
    }

    /// Sends `message` to the node owning `key`'s partition (picked per
    /// `policy.replica`) and returns its reply, retrying up to
    /// `policy.max_retries` additional times on a retriable error.
    pub async fn send(
        &self,
        key: &Key,
        policy: &BasePolicy,
        message: impl Fn() -> Message,
    ) -> error_stack::Result<Message, ClientError> {
        let backoff = ConstantBuilder::default()
            .with_delay(policy.sleep_between_retries)
            .with_max_times(policy.max_retries as usize);

        let attempt_no = AtomicUsize::new(0);
        let attempt = || async {
            let attempt = attempt_no.fetch_add(1, Ordering::Relaxed);
            self.send_once(key, policy, message(), attempt).await
        };

        attempt.retry(backoff).when(|e| is_retriable(e)).await
    }

    /// Picks which replica rank to target for this attempt, per
    /// `policy.replica`:
    /// - `Master` always targets rank 0.
    /// - `Any` and `PreferRack` (rack awareness isn't modeled here, so it
    ///   falls back to `Any`'s behavior) spread load round-robin across every
    ///   rank the partition table currently knows about.
    /// - `Sequence` walks ranks in order by retry attempt, so a prole is only
    ///   tried once the master attempt has already failed.
    fn replica_rank(&self, policy: &BasePolicy, namespace: &str, partition: u16, attempt: usize) -> usize {
        let known = self.cluster.replica_count(namespace, partition).max(1);
        match policy.replica {
            Replica::Master => 0,
            Replica::Sequence => attempt % known,
            Replica::Any | Replica::PreferRack => self.round_robin.fetch_add(1, Ordering::Relaxed) % known,
        }
    }

    async fn send_once(
        &self,
        key: &Key,
        policy: &BasePolicy,
        message: Message,
        attempt: usize,
    ) -> error_stack::Result<Message, ClientError> {
        let partition = partition_id(key.digest());
        let replica_rank = self.replica_rank(policy, &key.namespace, partition, attempt);

        let node = self
            .cluster
            .node_for(&key.namespace, partition, replica_rank)
            .ok_or_else(|| error_stack::Report::new(ClientError::cluster("no node owns this partition yet")))?;

        let mut conn = node.pool.get().await?;
        let result = self.roundtrip(conn.socket_mut(), &message, policy.socket_timeout).await;
        match result {
            Ok(reply) => {
                conn.release();
                Ok(reply)
            }
            Err(err) => {
                // A timed-out socket may still have the rest of a reply in
                // flight; closing it immediately would reset that write
                // under the peer. Anything else leaves the stream in an
                // unknown state that isn't safe to reuse at all.
                if err.current_context().kind() == ErrorKind::Timeout {
                    conn.recover();
                } else {
                    conn.discard();
                }
                Err(err)
            }
        }
    }

    async fn roundtrip(
        &self,
        socket: &mut aerospike_socket::Socket,
        message: &Message,
        deadline: Duration,
    ) -> error_stack::Result<Message, ClientError> {
        let policy = self.cluster.client_policy();

        let mut body = Vec::with_capacity(message.calculate_size());
        message.write(&mut body).map_err(protocol_err)?;

        let kind = if policy.use_compression && body.len() > policy.compression_threshold_bytes {
            body = compression::compress(&body).map_err(protocol_err)?;
            EnvelopeType::Compressed
        } else {
            EnvelopeType::Record
        };
        maybe_corrupt(&mut body);

        let mut header = vec![];
        Envelope {
            kind,
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

        let payload = match envelope.kind {
            EnvelopeType::Compressed => compression::decompress(&payload).map_err(protocol_err)?,
            _ => payload,
        };

        let mut cursor = std::io::Cursor::new(payload);
        Message::read(&mut cursor).map_err(protocol_err)
    }
}

fn protocol_err(err: std::io::Error) -> error_stack::Report<ClientError> {
    error_stack::Report::new(ClientError::network(err.to_string()))
}

fn is_retriable(err: &error_stack::Report<ClientError>) -> bool {
    err.current_context().is_retriable()
}
