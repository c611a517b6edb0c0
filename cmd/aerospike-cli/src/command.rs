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

use std::time::Duration;

use aerospike::Client;
use aerospike_types::config::ClusterConfig;
use aerospike_types::Bin;
use aerospike_types::Key;
use aerospike_types::ReadPolicy;
use aerospike_types::ScanPolicy;
use aerospike_types::Value;
use aerospike_types::WritePolicy;
use clap::Parser;
use clap::Subcommand;
use error_stack::ResultExt;
use futures::StreamExt;

use crate::Error;

#[derive(Debug, Parser)]
#[command(name = "aerospike-cli", version, long_version = aerospike_version::version())]
pub struct Command {
    /// Seed node host.
    #[arg(short = 'h', long, default_value = "127.0.0.1", global = true)]
    host: String,
    /// Seed node port.
    #[arg(short = 'p', long, default_value_t = 3000, global = true)]
    port: u16,
    /// Namespace the operation runs against.
    #[arg(short = 'n', long, default_value = "test", global = true)]
    namespace: String,
    /// Set the operation runs against; empty means the null set.
    #[arg(short = 's', long, default_value = "", global = true)]
    set: String,
    /// Per-attempt socket deadline, in milliseconds.
    #[arg(short = 'm', long, default_value_t = 1000, global = true)]
    millis: u64,
    /// Log at DEBUG instead of the default INFO.
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: SubCommand,
}

#[derive(Debug, Subcommand)]
pub enum SubCommand {
    /// Write one or more bins to a record.
    Put(CommandPut),
    /// Read a record, optionally limited to the named bins.
    Get(CommandGet),
    /// Delete a record.
    Delete(CommandDelete),
    /// Query node info.
    Info(CommandInfo),
    /// Stream every record in the namespace/set.
    Scan(CommandScan),
}

impl Command {
    pub fn run(self) -> error_stack::Result<(), Error> {
        aerospike_telemetry::init(&aerospike_types::config::TelemetryConfig {
            log: aerospike_types::config::LogConfig {
                stderr: Some(aerospike_types::config::StderrAppenderConfig {
                    filter: if self.verbose { "DEBUG".to_string() } else { "INFO".to_string() },
                }),
            },
        });

        let rt = aerospike_runtime::make_runtime("aerospike-cli", "aerospike-cli", 1);
        let deadline = Duration::from_millis(self.millis);
        let seed = format!("{}:{}", self.host, self.port);
        let namespace = self.namespace;
        let set = self.set;
        let cmd = self.cmd;

        rt.block_on(async move {
            let config = ClusterConfig {
                seed_hosts: vec![seed.clone()],
                ..Default::default()
            };
            let client = Client::connect(config)
                .await
                .change_context_lazy(|| Error(format!("failed to connect to {seed}")))?;

            match cmd {
                SubCommand::Put(cmd) => cmd.run(&client, &namespace, &set, deadline).await,
                SubCommand::Get(cmd) => cmd.run(&client, &namespace, &set, deadline).await,
                SubCommand::Delete(cmd) => cmd.run(&client, &namespace, &set, deadline).await,
                SubCommand::Info(cmd) => cmd.run(&client, deadline).await,
                SubCommand::Scan(cmd) => cmd.run(&client, &namespace, &set, deadline).await,
            }
        })
    }
}

#[derive(Debug, Parser)]
pub struct CommandPut {
    /// The record's user key.
    key: String,
    /// `name=value` pairs; a value parses as an integer when possible, else a string.
    #[arg(required = true)]
    bins: Vec<String>,
}

impl CommandPut {
    async fn run(self, client: &Client, namespace: &str, set: &str, deadline: Duration) -> error_stack::Result<(), Error> {
        let key = make_key(namespace, set, &self.key)?;
        let bins = self
            .bins
            .iter()
            .map(|pair| parse_bin(pair))
            .collect::<error_stack::Result<Vec<_>, Error>>()?;

        let policy = WritePolicy {
            base: aerospike_types::BasePolicy {
                socket_timeout: deadline,
                ..Default::default()
            },
            ..Default::default()
        };
        client
            .put(&policy, &key, &bins)
            .await
            .change_context_lazy(|| Error(format!("put {} failed", self.key)))?;
        println!("OK");
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct CommandGet {
    key: String,
    /// Bin names to fetch; empty fetches every bin.
    bins: Vec<String>,
}

impl CommandGet {
    async fn run(self, client: &Client, namespace: &str, set: &str, deadline: Duration) -> error_stack::Result<(), Error> {
        let key = make_key(namespace, set, &self.key)?;
        let bin_names: Vec<&str> = self.bins.iter().map(String::as_str).collect();

        let policy = ReadPolicy {
            base: aerospike_types::BasePolicy {
                socket_timeout: deadline,
                ..Default::default()
            },
        };
        let record = client
            .get(&policy, &key, &bin_names)
            .await
            .change_context_lazy(|| Error(format!("get {} failed", self.key)))?;

        match record {
            Some(record) => {
                println!("generation={} ttl={}", record.generation, record.ttl);
                for bin in &record.bins {
                    println!("{}={:?}", bin.name, bin.value);
                }
            }
            None => println!("not found"),
        }
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct CommandDelete {
    key: String,
}

impl CommandDelete {
    async fn run(self, client: &Client, namespace: &str, set: &str, deadline: Duration) -> error_stack::Result<(), Error> {
        let key = make_key(namespace, set, &self.key)?;
        let policy = WritePolicy {
            base: aerospike_types::BasePolicy {
                socket_timeout: deadline,
                ..Default::default()
            },
            ..Default::default()
        };
        let existed = client
            .delete(&policy, &key)
            .await
            .change_context_lazy(|| Error(format!("delete {} failed", self.key)))?;
        println!("{}", if existed { "deleted" } else { "not found" });
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct CommandInfo {
    /// Info command names; defaults to `node` and `namespaces`.
    names: Vec<String>,
}

impl CommandInfo {
    async fn run(self, client: &Client, deadline: Duration) -> error_stack::Result<(), Error> {
        let node = client
            .cluster()
            .nodes()
            .into_iter()
            .next()
            .ok_or_else(|| Error("no node is known to the cluster yet".to_string()))?;

        let names = if self.names.is_empty() {
            vec!["node".to_string(), "namespaces".to_string()]
        } else {
            self.names
        };
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let reply = client
            .info(&node.name, &name_refs, deadline)
            .await
            .change_context_lazy(|| Error(format!("info request to {} failed", node.name)))?;
        for (name, value) in reply {
            println!("{name}\t{value}");
        }
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct CommandScan {
    /// Bin names to fetch; empty fetches every bin.
    bins: Vec<String>,
}

impl CommandScan {
    async fn run(self, client: &Client, namespace: &str, set: &str, deadline: Duration) -> error_stack::Result<(), Error> {
        let bin_names: Vec<&str> = self.bins.iter().map(String::as_str).collect();
        let policy = ScanPolicy {
            base: aerospike_types::BasePolicy {
                socket_timeout: deadline,
                ..Default::default()
            },
            ..Default::default()
        };

        let mut stream = client
            .scan(&policy, namespace, set, &bin_names)
            .await
            .change_context_lazy(|| Error(format!("scan of {namespace}/{set} failed")))?;

        let mut count = 0u64;
        while let Some(record) = stream.next().await {
            let record = record.change_context_lazy(|| Error("scan stream returned an error".to_string()))?;
            let bins = record.bins.iter().map(|b| format!("{}={:?}", b.name, b.value)).collect::<Vec<_>>().join(", ");
            println!("{bins}");
            count += 1;
        }
        println!("{count} records");
        Ok(())
    }
}

fn make_key(namespace: &str, set: &str, user_key: &str) -> error_stack::Result<Key, Error> {
    Key::new(namespace, set, user_key).change_context_lazy(|| Error(format!("invalid key {user_key:?}")))
}

fn parse_bin(pair: &str) -> error_stack::Result<Bin, Error> {
    let (name, value) = pair
        .split_once('=')
        .ok_or_else(|| Error(format!("expected name=value, got {pair:?}")))?;
    let value = match value.parse::<i64>() {
        Ok(n) => Value::Integer(n),
        Err(_) => Value::from(value),
    };
    Bin::new(name, value).change_context_lazy(|| Error(format!("invalid bin {pair:?}")))
}
