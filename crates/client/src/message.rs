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

//! Builds the record [`Message`] for each public operation and turns a reply
//! back into a [`Record`] or an error. The four-way `RecordExistsAction`
//! matrix the real server exposes collapses to three wire bits here
//! (`CREATE_ONLY`, `UPDATE_ONLY`, `REPLACE_ONLY`); plain `Update` and
//! `Replace` both write with none of them set and rely on the server's
//! default merge-or-replace behavior for the bins actually sent.

use aerospike_protocol::fields::Field;
use aerospike_protocol::message::info1;
use aerospike_protocol::message::info2;
use aerospike_protocol::message::info3;
use aerospike_protocol::message::Message;
use aerospike_protocol::message::MessageHeader;
use aerospike_protocol::ops::Operation;
use aerospike_protocol::ops::OperatorType;
use aerospike_protocol::result_code;
use aerospike_types::Bin;
use aerospike_types::ClientError;
use aerospike_types::GenerationPolicy;
use aerospike_types::Key;
use aerospike_types::Record;
use aerospike_types::RecordExistsAction;
use aerospike_types::WritePolicy;

use crate::Result;

pub(crate) fn key_fields(key: &Key) -> Vec<Field> {
    let mut fields = vec![Field::namespace(&key.namespace)];
    if !key.set.is_empty() {
        fields.push(Field::set_name(&key.set));
    }
    fields.push(Field::digest(key.digest()));
    fields
}

pub(crate) fn read_request(key: &Key, bin_names: &[&str]) -> Message {
    let (info1_bits, ops) = if bin_names.is_empty() {
        (info1::READ | info1::GET_ALL, vec![])
    } else {
        (info1::READ, bin_names.iter().map(|name| Operation::read(*name)).collect())
    };
    Message {
        header: MessageHeader {
            info1: info1_bits,
            ..Default::default()
        },
        fields: key_fields(key),
        ops,
    }
}

pub(crate) fn exists_request(key: &Key) -> Message {
    Message {
        header: MessageHeader {
            info1: info1::READ | info1::GET_ALL | info1::NOBINDATA,
            ..Default::default()
        },
        fields: key_fields(key),
        ops: vec![],
    }
}

fn exists_action_bits(action: RecordExistsAction) -> (u8, u8) {
    match action {
        RecordExistsAction::CreateOnly => (info2::CREATE_ONLY, 0),
        RecordExistsAction::UpdateOnly => (0, info3::UPDATE_ONLY),
        RecordExistsAction::ReplaceOnly => (0, info3::REPLACE_ONLY),
        RecordExistsAction::Update | RecordExistsAction::Replace => (0, 0),
    }
}

pub(crate) fn write_request(key: &Key, policy: &WritePolicy, bins: &[Bin]) -> Message {
    let (extra_info2, info3_bits) = exists_action_bits(policy.exists_action);
    let mut info2_bits = info2::WRITE | extra_info2;
    match policy.generation_policy {
        GenerationPolicy::None => {}
        GenerationPolicy::ExpectGenEqual => info2_bits |= info2::GENERATION,
        GenerationPolicy::ExpectGenGreater => info2_bits |= info2::GENERATION_GT,
    }
    if policy.durable_delete {
        info2_bits |= info2::DURABLE_DELETE;
    }

    Message {
        header: MessageHeader {
            info2: info2_bits,
            info3: info3_bits,
            generation: policy.expected_generation,
            record_ttl: policy.expiration,
            ..Default::default()
        },
        fields: key_fields(key),
        ops: bins.iter().map(|bin| Operation::write(bin.name.clone(), bin.value.clone())).collect(),
    }
}

pub(crate) fn delete_request(key: &Key, policy: &WritePolicy) -> Message {
    let mut info2_bits = info2::WRITE | info2::DELETE;
    if policy.durable_delete {
        info2_bits |= info2::DURABLE_DELETE;
    }
    Message {
        header: MessageHeader {
            info2: info2_bits,
            ..Default::default()
        },
        fields: key_fields(key),
        ops: vec![],
    }
}

pub(crate) fn touch_request(key: &Key, policy: &WritePolicy) -> Message {
    Message {
        header: MessageHeader {
            info2: info2::WRITE,
            record_ttl: policy.expiration,
            ..Default::default()
        },
        fields: key_fields(key),
        ops: vec![Operation::touch()],
    }
}

pub(crate) fn operate_request(key: &Key, policy: &WritePolicy, ops: Vec<Operation>) -> Message {
    let has_write = ops.iter().any(|op| op.op != OperatorType::Read);
    let has_read = ops.iter().any(|op| op.op == OperatorType::Read);

    let mut info1_bits = 0;
    if has_read {
        info1_bits |= info1::READ;
    }
    let mut info2_bits = 0;
    if has_write {
        info2_bits |= info2::WRITE;
        if policy.durable_delete {
            info2_bits |= info2::DURABLE_DELETE;
        }
    }

    Message {
        header: MessageHeader {
            info1: info1_bits,
            info2: info2_bits,
            generation: policy.expected_generation,
            record_ttl: policy.expiration,
            ..Default::default()
        },
        fields: key_fields(key),
        ops,
    }
}

/// Maps a non-zero reply result code to a server error; `KEY_NOT_FOUND` on a
/// read is surfaced to callers as `Ok(None)` instead, since it isn't a fault.
pub(crate) fn check_result_code(message: &Message) -> Result<()> {
    let code = message.header.result_code;
    if code == result_code::OK {
        return Ok(());
    }
    Err(error_stack::Report::new(ClientError::server(code, result_code::describe(code))))
}

pub(crate) fn parse_record(message: &Message) -> Record {
    Record {
        generation: message.header.generation,
        ttl: message.header.record_ttl,
        bins: message
            .ops
            .iter()
            .map(|op| Bin {
                name: op.bin_name.clone(),
                value: op.value.clone(),
            })
            .collect(),
    }
}
