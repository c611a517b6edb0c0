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

//! Administrative operations: secondary indexes, UDF modules, and user/role
//! management. Each is one request/reply pair over an `Admin` envelope,
//! encoded with the same `name<sep>value` line shape the info sub-protocol
//! uses, but kept on its own envelope type so a node can apply different
//! auth checks to it than to ordinary info requests.

use std::time::Duration;

use aerospike_protocol::envelope::Envelope;
use aerospike_protocol::envelope::EnvelopeType;
use aerospike_protocol::info;
use aerospike_types::ClientError;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    Numeric,
    String,
    Geo2DSphere,
}

impl IndexType {
    fn as_str(&self) -> &'static str {
        match self {
            IndexType::Numeric => "numeric",
            IndexType::String => "string",
            IndexType::Geo2DSphere => "geo2dsphere",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    pub roles: Vec<String>,
}

async fn admin_roundtrip(socket: &mut aerospike_socket::Socket, command: &str, deadline: Duration) -> Result<Vec<(String, String)>> {
    let body = info::encode_request(&[command]);

    let mut header = vec![];
    Envelope {
        kind: EnvelopeType::Admin,
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

/// Runs one admin command against `socket` and checks that it reports
/// `status=ok`, releasing the caller from having to repeat that check at
/// every call site.
pub(crate) async fn run_checked(socket: &mut aerospike_socket::Socket, command: &str, deadline: Duration) -> Result<Vec<(String, String)>> {
    let fields = admin_roundtrip(socket, command, deadline).await?;
    match fields.iter().find(|(k, _)| k == "status").map(|(_, v)| v.as_str()) {
        Some("ok") => Ok(fields),
        Some(other) => Err(error_stack::Report::new(ClientError::server(0, format!("admin command failed: {other}")))),
        None => Err(error_stack::Report::new(ClientError::cluster("admin reply carried no status field"))),
    }
}

pub(crate) fn index_create_command(namespace: &str, set: &str, bin: &str, index_name: &str, index_type: IndexType) -> String {
    format!("op=index-create;ns={namespace};set={set};bin={bin};indexname={index_name};indextype={}", index_type.as_str())
}

pub(crate) fn index_remove_command(namespace: &str, index_name: &str) -> String {
    format!("op=index-remove;ns={namespace};indexname={index_name}")
}

pub(crate) fn udf_put_command(module_name: &str, content: &[u8]) -> String {
    format!("op=udf-put;filename={module_name};content={}", BASE64_STANDARD.encode(content))
}

pub(crate) fn udf_get_command(module_name: &str) -> String {
    format!("op=udf-get;filename={module_name}")
}

pub(crate) fn udf_list_command() -> String {
    "op=udf-list".to_string()
}

pub(crate) fn udf_remove_command(module_name: &str) -> String {
    format!("op=udf-remove;filename={module_name}")
}

pub(crate) fn user_create_command(username: &str, password: &str, roles: &[&str]) -> String {
    format!("op=user-create;user={username};password={password};roles={}", roles.join(","))
}

pub(crate) fn user_drop_command(username: &str) -> String {
    format!("op=user-drop;user={username}")
}

pub(crate) fn grant_roles_command(username: &str, roles: &[&str]) -> String {
    format!("op=grant-roles;user={username};roles={}", roles.join(","))
}

pub(crate) fn revoke_roles_command(username: &str, roles: &[&str]) -> String {
    format!("op=revoke-roles;user={username};roles={}", roles.join(","))
}

pub(crate) fn set_password_command(username: &str, password: &str) -> String {
    format!("op=set-password;user={username};password={password}")
}

pub(crate) fn query_user_command(username: &str) -> String {
    format!("op=query-user;user={username}")
}

pub(crate) fn parse_udf_content(fields: &[(String, String)]) -> Result<Vec<u8>> {
    let encoded = fields
        .iter()
        .find(|(k, _)| k == "content")
        .map(|(_, v)| v.as_str())
        .ok_or_else(|| error_stack::Report::new(ClientError::cluster("udf-get reply carried no content field")))?;
    BASE64_STANDARD
        .decode(encoded)
        .map_err(|e| error_stack::Report::new(ClientError::cluster(format!("udf content was not valid base64: {e}"))))
}

pub(crate) fn parse_udf_list(fields: &[(String, String)]) -> Vec<String> {
    fields
        .iter()
        .find(|(k, _)| k == "filename")
        .map(|(_, v)| v.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

pub(crate) fn parse_user_info(username: &str, fields: &[(String, String)]) -> UserInfo {
    let roles = fields
        .iter()
        .find(|(k, _)| k == "roles")
        .map(|(_, v)| v.split(',').filter(|r| !r.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();
    UserInfo {
        name: username.to_string(),
        roles,
    }
}

fn protocol_err(err: std::io::Error) -> error_stack::Report<ClientError> {
    error_stack::Report::new(ClientError::network(err.to_string()))
}
