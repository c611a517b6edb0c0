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

//! Field type ids that prefix the field list in a record message. Ids are
//! ABI-fixed by the server and must never be renumbered.

use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::codec::err_codec;
use crate::codec::read_exact_vec;
use crate::codec::Decoder;
use crate::codec::Encoder;
use crate::codec::UInt32;
use crate::codec::UInt8;
use crate::IoResult;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum FieldType {
    Namespace = 0,
    SetName = 1,
    Key = 2,
    Digest = 4,
    TransactionId = 5,
    TransactionDeadline = 6,
    Replica = 21,
    ScanOptions = 22,
    ScanTimeout = 23,
    QueryBinList = 25,
    QueryRange = 26,
    IndexName = 27,
    Filter = 28,
    UdfModule = 29,
    UdfFunction = 30,
    UdfArgList = 31,
    UdfOp = 32,
    /// Client-local extension: not part of the server's field table. Carries
    /// an encoded [`aerospike_types::PartitionFilter`] so a scan/query can
    /// request a subset of partitions or resume a paginated one.
    PartitionFilter = 33,
    /// Client-local extension: an 8-byte big-endian task id attached to a
    /// background scan/query so [`crate::message::info1::BACKGROUND`]
    /// requests against every node can be correlated to one logical job.
    JobId = 34,
}

impl TryFrom<u8> for FieldType {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, u8> {
        Ok(match tag {
            0 => FieldType::Namespace,
            1 => FieldType::SetName,
            2 => FieldType::Key,
            4 => FieldType::Digest,
            5 => FieldType::TransactionId,
            6 => FieldType::TransactionDeadline,
            21 => FieldType::Replica,
            22 => FieldType::ScanOptions,
            23 => FieldType::ScanTimeout,
            25 => FieldType::QueryBinList,
            26 => FieldType::QueryRange,
            27 => FieldType::IndexName,
            28 => FieldType::Filter,
            29 => FieldType::UdfModule,
            30 => FieldType::UdfFunction,
            31 => FieldType::UdfArgList,
            32 => FieldType::UdfOp,
            33 => FieldType::PartitionFilter,
            34 => FieldType::JobId,
            other => return Err(other),
        })
    }
}

/// A decoded field: its type tag plus raw payload bytes. Higher layers
/// (`aerospike-router`, `aerospike` client ops) interpret the payload according
/// to `kind`.
#[derive(Debug, Clone)]
pub struct Field {
    pub kind: FieldType,
    pub data: Vec<u8>,
}

impl Field {
    pub fn new(kind: FieldType, data: Vec<u8>) -> Self {
        Field { kind, data }
    }

    pub fn namespace(ns: &str) -> Self {
        Field::new(FieldType::Namespace, ns.as_bytes().to_vec())
    }

    pub fn set_name(set: &str) -> Self {
        Field::new(FieldType::SetName, set.as_bytes().to_vec())
    }

    pub fn digest(digest: &[u8; 20]) -> Self {
        Field::new(FieldType::Digest, digest.to_vec())
    }

    pub fn partition_filter(filter: &aerospike_types::PartitionFilter) -> Self {
        Field::new(FieldType::PartitionFilter, filter.to_bytes())
    }

    pub fn calculate_size(&self) -> usize {
        1 + self.data.len()
    }

    pub fn write<B: WriteBytesExt>(&self, buf: &mut B) -> IoResult<()> {
        UInt32.encode(buf, self.calculate_size() as u32)?;
        UInt8.encode(buf, self.kind as u8)?;
        buf.write_all(&self.data)
    }

    pub fn read<B: ReadBytesExt>(buf: &mut B) -> IoResult<Self> {
        let size = UInt32.decode(buf)? as usize;
        if size < 1 {
            return Err(err_codec("field size smaller than its own type tag"));
        }
        let kind = FieldType::try_from(UInt8.decode(buf)?).map_err(|t| err_codec(format!("unknown field type {t}")))?;
        let data = read_exact_vec(buf, size - 1)?;
        Ok(Field { kind, data })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn write_read_round_trips() {
        let field = Field::namespace("test");
        let mut buf = vec![];
        field.write(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded = Field::read(&mut cursor).unwrap();
        assert_eq!(decoded.kind, FieldType::Namespace);
        assert_eq!(decoded.data, b"test");
    }
}
