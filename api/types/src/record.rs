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

use crate::error::ClientError;
use crate::value::Value;

const MAX_BIN_NAME_LEN: usize = 15;

/// A single named value inside a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub name: String,
    pub value: Value,
}

impl Bin {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> error_stack::Result<Self, ClientError> {
        let name = name.into();
        if name.len() > MAX_BIN_NAME_LEN || name.as_bytes().contains(&0) {
            return Err(ClientError::parameter(format!(
                "bin name {name:?} exceeds {MAX_BIN_NAME_LEN} bytes or contains NUL"
            ))
            .into());
        }
        Ok(Bin {
            name,
            value: value.into(),
        })
    }
}

/// The result of a successful read: metadata plus a name-unique bin set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub generation: u32,
    pub ttl: u32,
    pub bins: Vec<Bin>,
}

impl Record {
    pub fn bin(&self, name: &str) -> Option<&Value> {
        self.bins.iter().find(|b| b.name == name).map(|b| &b.value)
    }
}
