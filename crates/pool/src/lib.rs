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

//! A bounded pool of [`Socket`]s to a single node. Checked-out connections
//! are returned (`release`), dropped outright (`discard`, on a non-timeout
//! error), or handed to the recover list (`recover`, after a timeout) so a
//! socket whose framing we can no longer trust doesn't get closed out from
//! under bytes the peer is still sending. A `tokio::sync::Semaphore` bounds
//! how many are outstanding at once so a burst of concurrent requests waits
//! rather than opens unbounded sockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use aerospike_socket::Socket;
use aerospike_types::ClientError;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

/// How long the recover list gives a timed-out socket to finish draining
/// before it's dropped regardless.
const RECOVER_DRAIN_TIMEOUT: Duration = Duration::from_millis(200);

struct Inner {
    idle: Mutex<Vec<Socket>>,
    semaphore: Semaphore,
    addr: SocketAddr,
    min_connections: usize,
    connect_timeout: Duration,
    max_socket_idle: Duration,
    tls: Option<(aerospike_types::config::TlsConfig, String)>,
    recovering: Mutex<usize>,
}

/// A bounded pool of connections to one node.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<Inner>,
}

/// A socket checked out of the pool. Dropping it without calling
/// [`PooledSocket::release`] returns the permit but discards the connection,
/// since we can no longer tell whether it's in a valid protocol state.
pub struct PooledSocket {
    socket: Option<Socket>,
    pool: ConnectionPool,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl ConnectionPool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        addr: SocketAddr,
        min_connections: usize,
        max_connections: usize,
        connect_timeout: Duration,
        max_socket_idle: Duration,
        tls: Option<(aerospike_types::config::TlsConfig, String)>,
    ) -> Self {
        ConnectionPool {
            inner: Arc::new(Inner {
                idle: Mutex::new(Vec::new()),
                semaphore: Semaphore::new(max_connections),
                addr,
                min_connections,
                connect_timeout,
                max_socket_idle,
                tls,
                recovering: Mutex::new(0),
            }),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.inner.addr
    }

    /// Borrows an idle connection if one is usable, otherwise dials a new one.
    /// Always bounded by the pool's semaphore, so this can wait under load
    /// rather than exceed `max_connections`.
    pub async fn get(&self) -> error_stack::Result<PooledSocket, ClientError> {
        let permit = self
            .inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ClientError::pool("connection pool semaphore closed"))?;

        let recycled = {
            let mut idle = self.inner.idle.lock();
            loop {
                match idle.pop() {
                    Some(socket) if socket.is_usable(self.inner.max_socket_idle) => break Some(socket),
                    Some(_stale) => continue,
                    None => break None,
                }
            }
        };

        let socket = match recycled {
            Some(socket) => socket,
            None => {
                let tls = self.inner.tls.as_ref().map(|(cfg, name)| (cfg, name.as_str()));
                Socket::connect(self.inner.addr, self.inner.connect_timeout, tls).await?
            }
        };

        Ok(PooledSocket {
            socket: Some(socket),
            pool: self.clone(),
            _permit: permit,
        })
    }

    fn return_idle(&self, socket: Socket) {
        if socket.is_usable(self.inner.max_socket_idle) {
            self.inner.idle.lock().push(socket);
        }
    }

    /// Registers a socket that just missed a deadline for non-blocking
    /// drain instead of an immediate close. A background task reads off it
    /// for up to [`RECOVER_DRAIN_TIMEOUT`] and then drops it, so the fd stops
    /// being this caller's problem without that caller waiting on the peer's
    /// pace; per the recover-list contract it shows up here within one event
    /// loop tick of the timeout.
    fn recover_after_timeout(&self, mut socket: Socket) {
        *self.inner.recovering.lock() += 1;
        let pool = self.clone();
        aerospike_runtime::io_runtime().spawn(async move {
            socket.drain(RECOVER_DRAIN_TIMEOUT).await;
            *pool.inner.recovering.lock() -= 1;
        });
    }

    pub fn idle_len(&self) -> usize {
        self.inner.idle.lock().len()
    }

    /// How many sockets are currently being drained on the recover list.
    pub fn recovering_len(&self) -> usize {
        *self.inner.recovering.lock()
    }

    /// Drops idle sockets down to `min_connections_per_node`, called once per
    /// tend tick so a node that no longer needs as many warm connections
    /// doesn't keep holding them open.
    pub fn trim_idle(&self) {
        let mut idle = self.inner.idle.lock();
        while idle.len() > self.inner.min_connections {
            idle.pop();
        }
    }
}

impl PooledSocket {
    pub fn socket_mut(&mut self) -> &mut Socket {
        self.socket.as_mut().expect("socket taken only by release/discard/recover")
    }

    /// Returns the connection to the pool for reuse.
    pub fn release(mut self) {
        if let Some(socket) = self.socket.take() {
            self.pool.return_idle(socket);
        }
    }

    /// Drops the connection without returning it to the pool, used after a
    /// network error leaves the protocol stream in an unknown state.
    pub fn discard(mut self) {
        self.socket.take();
    }

    /// Hands the connection to the pool's recover list instead of discarding
    /// it outright, for the case where it just missed a deadline: the server
    /// may still write the rest of an in-flight reply, and closing the fd
    /// immediately would reset that write instead of letting it drain.
    pub fn recover(mut self) {
        if let Some(socket) = self.socket.take() {
            self.pool.recover_after_timeout(socket);
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn recycles_released_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        let pool = ConnectionPool::new(addr, 0, 2, Duration::from_secs(1), Duration::from_secs(55), None);

        let conn = pool.get().await.unwrap();
        assert_eq!(pool.idle_len(), 0);
        conn.release();
        assert_eq!(pool.idle_len(), 1);

        let _conn2 = pool.get().await.unwrap();
        assert_eq!(pool.idle_len(), 0);
    }

    #[tokio::test]
    async fn discarded_connections_are_not_recycled() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        let pool = ConnectionPool::new(addr, 0, 2, Duration::from_secs(1), Duration::from_secs(55), None);
        let conn = pool.get().await.unwrap();
        conn.discard();
        assert_eq!(pool.idle_len(), 0);
    }

    #[tokio::test]
    async fn recovered_connections_are_drained_in_the_background_not_recycled() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        let pool = ConnectionPool::new(addr, 0, 2, Duration::from_secs(1), Duration::from_secs(55), None);
        let conn = pool.get().await.unwrap();
        conn.recover();
        assert_eq!(pool.idle_len(), 0);

        // the drain runs on the io runtime, not this test's own runtime;
        // give it a moment to finish and release the permit.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _conn2 = pool.get().await.unwrap();
    }

    #[tokio::test]
    async fn trim_idle_drops_sockets_past_min_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        let pool = ConnectionPool::new(addr, 1, 3, Duration::from_secs(1), Duration::from_secs(55), None);
        let a = pool.get().await.unwrap();
        let b = pool.get().await.unwrap();
        a.release();
        b.release();
        assert_eq!(pool.idle_len(), 2);

        pool.trim_idle();
        assert_eq!(pool.idle_len(), 1);
    }
}
