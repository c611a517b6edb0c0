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

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::ClientPolicy;

/// Optional TLS context for a cluster. `login_only` means TLS authenticates the
/// connection and is then stripped, reverting to cleartext for commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub ca_file: Option<String>,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
    #[serde(default)]
    pub login_only: bool,
    #[serde(default)]
    pub cert_blacklist: Vec<String>,
}

/// Everything needed to seed and maintain a connection to one Aerospike cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// One or more `host:port` seed addresses.
    pub seed_hosts: Vec<String>,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    /// Translates a discovered hostname to a routable one, for private/public
    /// address splits.
    #[serde(default)]
    pub alternate_names: HashMap<String, String>,
    #[serde(skip, default = "ClientPolicy::default")]
    pub client_policy: ClientPolicy,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            seed_hosts: vec!["127.0.0.1:3000".to_string()],
            tls: None,
            alternate_names: HashMap::new(),
            client_policy: ClientPolicy::default(),
        }
    }
}
