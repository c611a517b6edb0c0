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

//! Encodes/decodes a single bin value's payload (the type tag itself is carried
//! by the surrounding operation/field header, not here). Lists and maps are
//! msgpack, matching the server's CDT wire format.

use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::codec::err_codec;
use crate::codec::read_exact_vec;
use crate::codec::Decoder;
use crate::codec::Encoder;
use crate::codec::Float64;
use crate::codec::Int64;
use crate::IoResult;
use aerospike_types::Value;
use aerospike_types::ValueType;

pub fn calculate_size(value: &Value) -> usize {
    match value {
        Value::Nil => 0,
        Value::Integer(_) => 8,
        Value::Double(_) => 8,
        Value::String(s) => s.len(),
        Value::Blob(b) => b.len(),
        Value::GeoJson(s) => s.len(),
        Value::Hll(b) => b.len(),
        Value::List(_) | Value::Map(_) => msgpack_bytes(value).len(),
    }
}

pub fn write<B: WriteBytesExt>(buf: &mut B, value: &Value) -> IoResult<()> {
    match value {
        Value::Nil => Ok(()),
        Value::Integer(v) => Int64.encode(buf, *v),
        Value::Double(v) => Float64.encode(buf, *v),
        Value::String(s) => buf.write_all(s.as_bytes()),
        Value::Blob(b) => buf.write_all(b),
        Value::GeoJson(s) => buf.write_all(s.as_bytes()),
        Value::Hll(b) => buf.write_all(b),
        Value::List(_) | Value::Map(_) => buf.write_all(&msgpack_bytes(value)),
    }
}

pub fn read<B: ReadBytesExt>(buf: &mut B, type_tag: u8, len: usize) -> IoResult<Value> {
    let kind = ValueType::try_from(type_tag).map_err(|t| err_codec(format!("unknown value type {t}")))?;
    Ok(match kind {
        ValueType::Nil => Value::Nil,
        ValueType::Integer => Value::Integer(Int64.decode(buf)?),
        ValueType::Double => Value::Double(Float64.decode(buf)?),
        ValueType::String => Value::String(String::from_utf8_lossy(&read_exact_vec(buf, len)?).into_owned()),
        ValueType::Blob => Value::Blob(read_exact_vec(buf, len)?),
        ValueType::GeoJson => Value::GeoJson(String::from_utf8_lossy(&read_exact_vec(buf, len)?).into_owned()),
        ValueType::Hll => Value::Hll(read_exact_vec(buf, len)?),
        ValueType::List | ValueType::Map => from_msgpack_bytes(&read_exact_vec(buf, len)?)?,
    })
}

fn to_msgpack_value(value: &Value) -> rmpv::Value {
    match value {
        Value::Nil => rmpv::Value::Nil,
        Value::Integer(v) => rmpv::Value::from(*v),
        Value::Double(v) => rmpv::Value::from(*v),
        Value::String(s) => rmpv::Value::from(s.as_str()),
        Value::Blob(b) => rmpv::Value::from(b.clone()),
        Value::GeoJson(s) => rmpv::Value::from(s.as_str()),
        Value::Hll(b) => rmpv::Value::from(b.clone()),
        Value::List(items) => rmpv::Value::Array(items.iter().map(to_msgpack_value).collect()),
        Value::Map(entries) => rmpv::Value::Map(
            entries
                .iter()
                .map(|(k, v)| (to_msgpack_value(k), to_msgpack_value(v)))
                .collect(),
        ),
    }
}

fn from_msgpack_value(value: rmpv::Value) -> Value {
    match value {
        rmpv::Value::Nil => Value::Nil,
        rmpv::Value::Boolean(b) => Value::Integer(b as i64),
        rmpv::Value::Integer(i) => Value::Integer(i.as_i64().unwrap_or_default()),
        rmpv::Value::F32(f) => Value::Double(f as f64),
        rmpv::Value::F64(f) => Value::Double(f),
        rmpv::Value::String(s) => Value::String(s.into_str().unwrap_or_default()),
        rmpv::Value::Binary(b) => Value::Blob(b),
        rmpv::Value::Array(items) => Value::List(items.into_iter().map(from_msgpack_value).collect()),
        rmpv::Value::Map(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (from_msgpack_value(k), from_msgpack_value(v)))
                .collect(),
        ),
        rmpv::Value::Ext(_, data) => Value::Blob(data),
    }
}

fn msgpack_bytes(value: &Value) -> Vec<u8> {
    let mut buf = vec![];
    rmpv::encode::write_value(&mut buf, &to_msgpack_value(value)).expect("writing to a Vec never fails");
    buf
}

fn from_msgpack_bytes(bytes: &[u8]) -> IoResult<Value> {
    let mut cursor = std::io::Cursor::new(bytes);
    let value = rmpv::decode::read_value(&mut cursor).map_err(|e| err_codec(format!("malformed msgpack: {e}")))?;
    Ok(from_msgpack_value(value))
}
