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

/// The wire type tag written as the first byte of every encoded value, and used
/// as the type-tag byte folded into the key digest.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
#[repr(u8)]
pub enum ValueType {
    Nil = 0,
    Integer = 1,
    Double = 2,
    String = 3,
    Blob = 4,
    List = 20,
    Map = 21,
    GeoJson = 23,
    Hll = 24,
}

impl TryFrom<u8> for ValueType {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, u8> {
        match tag {
            0 => Ok(ValueType::Nil),
            1 => Ok(ValueType::Integer),
            2 => Ok(ValueType::Double),
            3 => Ok(ValueType::String),
            4 => Ok(ValueType::Blob),
            20 => Ok(ValueType::List),
            21 => Ok(ValueType::Map),
            23 => Ok(ValueType::GeoJson),
            24 => Ok(ValueType::Hll),
            other => Err(other),
        }
    }
}

/// A tagged bin or key value. Variants are a closed set matching the server's
/// particle types; there is no implicit coercion between them.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Integer(i64),
    Double(f64),
    String(String),
    Blob(Vec<u8>),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    GeoJson(String),
    Hll(Vec<u8>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Nil => ValueType::Nil,
            Value::Integer(_) => ValueType::Integer,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Blob(_) => ValueType::Blob,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
            Value::GeoJson(_) => ValueType::GeoJson,
            Value::Hll(_) => ValueType::Hll,
        }
    }

    /// The byte sequence folded into the key digest when this value is used as a
    /// user key. Only integer, string and blob keys are legal per the wire
    /// protocol; anything else is a client-side parameter error.
    pub fn digest_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Value::Integer(v) => Some(v.to_be_bytes().to_vec()),
            Value::String(s) => Some(s.as_bytes().to_vec()),
            Value::Blob(b) => Some(b.clone()),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}
