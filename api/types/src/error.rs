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

use std::fmt::Display;

/// The error taxonomy every fallible client call reports through. Matches the
/// classification the router uses to decide whether an attempt is retriable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad parameters, oversized payloads, or other caller-side mistakes.
    Client,
    /// Connect/read/write/TLS failure below the application layer.
    Network,
    /// Socket or total deadline expired.
    Timeout,
    /// Connection pool exhausted or closed.
    Pool,
    /// Non-zero result code returned by the server; `code` is preserved verbatim.
    Server { code: i8 },
    /// No nodes reachable, stale partition map, or no owner for a namespace.
    Cluster,
    /// Login failed or the session token expired.
    Auth,
    /// A multi-record transaction was rolled back.
    Aborted,
}

impl ErrorKind {
    /// Whether the router should retry an attempt that failed with this kind,
    /// per the retry policy in the design (`§4.5`/`§7`).
    pub fn is_retriable(self) -> bool {
        match self {
            ErrorKind::Network | ErrorKind::Timeout => true,
            ErrorKind::Cluster => true,
            ErrorKind::Server { code } => matches!(code, RESULT_CODE_CLUSTER_KEY_MISMATCH),
            ErrorKind::Client | ErrorKind::Pool | ErrorKind::Auth | ErrorKind::Aborted => false,
        }
    }
}

/// Server result code for a partition-map-vs-cluster mismatch; retriable after
/// the next tend cycle.
pub const RESULT_CODE_CLUSTER_KEY_MISMATCH: i8 = 7;

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ClientError {
    kind: ErrorKind,
    message: String,
}

impl ClientError {
    pub fn new(kind: ErrorKind, message: impl Display) -> Self {
        ClientError {
            kind,
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_retriable(&self) -> bool {
        self.kind.is_retriable()
    }

    pub fn parameter(message: impl Display) -> Self {
        Self::new(ErrorKind::Client, message)
    }

    pub fn network(message: impl Display) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn timeout(message: impl Display) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn pool(message: impl Display) -> Self {
        Self::new(ErrorKind::Pool, message)
    }

    pub fn server(code: i8, message: impl Display) -> Self {
        Self::new(ErrorKind::Server { code }, message)
    }

    pub fn cluster(message: impl Display) -> Self {
        Self::new(ErrorKind::Cluster, message)
    }

    pub fn auth(message: impl Display) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn aborted(message: impl Display) -> Self {
        Self::new(ErrorKind::Aborted, message)
    }
}
