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

//! A single connection to a node: a plain or TLS-wrapped `TcpStream` plus the
//! bookkeeping (last-used instant, deadline enforcement) `aerospike-pool` and
//! `aerospike-router` build on. Nothing here knows about the wire format;
//! see `aerospike-protocol` for that.

mod tls;

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use std::time::Instant;

use aerospike_types::config::TlsConfig;
use aerospike_types::ClientError;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

pub use tls::build_client_config;

enum Transport {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

/// A connection to one node, opened against a specific socket address.
pub struct Socket {
    transport: Transport,
    peer: SocketAddr,
    last_used: Instant,
}

impl Socket {
    pub async fn connect(
        addr: SocketAddr,
        connect_timeout: Duration,
        tls: Option<(&TlsConfig, &str)>,
    ) -> error_stack::Result<Self, ClientError> {
        let tcp = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::timeout("connect timed out"))?
            .map_err(io_err)?;
        tcp.set_nodelay(true).map_err(io_err)?;

        let transport = match tls {
            Some((tls_config, server_name)) => {
                let connector = tokio_rustls::TlsConnector::from(build_client_config(tls_config)?);
                let name = rustls_pki_types::ServerName::try_from(server_name.to_string())
                    .map_err(|e| ClientError::parameter(format!("invalid tls server name {server_name:?}: {e}")))?;
                let stream = connector.connect(name, tcp).await.map_err(io_err)?;
                Transport::Tls(Box::new(stream))
            }
            None => Transport::Plain(tcp),
        };

        Ok(Socket {
            transport,
            peer: addr,
            last_used: Instant::now(),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    /// A pooled socket is worth handing to a caller only if it hasn't sat idle
    /// past the policy's idle limit; past that the server may have already
    /// closed its end and a write would just surface as a broken pipe.
    pub fn is_usable(&self, max_idle: Duration) -> bool {
        self.idle_for() < max_idle
    }

    pub async fn write_all(&mut self, buf: &[u8], deadline: Duration) -> error_stack::Result<(), ClientError> {
        self.last_used = Instant::now();
        let fut = async {
            match &mut self.transport {
                Transport::Plain(s) => s.write_all(buf).await,
                Transport::Tls(s) => s.write_all(buf).await,
            }
        };
        timeout(deadline, fut)
            .await
            .map_err(|_| ClientError::timeout("write timed out"))?
            .map_err(io_err)
    }

    pub async fn read_exact(&mut self, buf: &mut [u8], deadline: Duration) -> error_stack::Result<(), ClientError> {
        self.last_used = Instant::now();
        let fut = async {
            match &mut self.transport {
                Transport::Plain(s) => s.read_exact(buf).await,
                Transport::Tls(s) => s.read_exact(buf).await,
            }
        };
        timeout(deadline, fut)
            .await
            .map_err(|_| ClientError::timeout("read timed out"))?
            .map_err(io_err)?;
        Ok(())
    }

    /// Best-effort, non-exact read used to drain whatever bytes a peer is
    /// still sending after this socket already missed its deadline once. The
    /// protocol framing can no longer be trusted at that point, so this reads
    /// until EOF, an error, or `deadline`, whichever comes first, and
    /// swallows the outcome either way; the caller is about to drop the
    /// socket regardless.
    pub async fn drain(&mut self, deadline: Duration) {
        let mut buf = [0u8; 4096];
        let fut = async {
            loop {
                let read = match &mut self.transport {
                    Transport::Plain(s) => s.read(&mut buf).await,
                    Transport::Tls(s) => s.read(&mut buf).await,
                };
                match read {
                    Ok(0) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
        };
        let _ = timeout(deadline, fut).await;
    }
}

fn io_err(err: io::Error) -> error_stack::Report<ClientError> {
    error_stack::Report::new(ClientError::network(err.to_string()))
}
