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

//! A record message is the payload of a `Record` (or, compressed, a
//! `Compressed`-wrapped `Record`) envelope: a fixed 22-byte header, then a
//! field list, then an operation list. This is the shape used by both
//! requests (read/write/delete/...) and the single-record replies to them;
//! `aerospike-router` is the only caller, which is why nothing here touches
//! sockets.

use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::codec::err_codec;
use crate::codec::Decoder;
use crate::codec::Encoder;
use crate::codec::Int8;
use crate::codec::UInt16;
use crate::codec::UInt32;
use crate::codec::UInt8;
use crate::fields::Field;
use crate::ops::Operation;
use crate::IoResult;

pub const HEADER_SIZE: u8 = 22;

/// Request-side intent bits carried in `info1`.
pub mod info1 {
    pub const READ: u8 = 1 << 0;
    pub const GET_ALL: u8 = 1 << 1;
    pub const BACKGROUND: u8 = 1 << 2;
    pub const BATCH: u8 = 1 << 3;
    pub const NOBINDATA: u8 = 1 << 5;
    pub const CONSISTENCY_ALL: u8 = 1 << 6;
}

/// Request-side intent bits carried in `info2`.
pub mod info2 {
    pub const WRITE: u8 = 1 << 0;
    pub const DELETE: u8 = 1 << 1;
    pub const GENERATION: u8 = 1 << 2;
    pub const GENERATION_GT: u8 = 1 << 3;
    pub const DURABLE_DELETE: u8 = 1 << 4;
    pub const CREATE_ONLY: u8 = 1 << 5;
}

/// Request-side intent bits carried in `info3`.
pub mod info3 {
    pub const LAST: u8 = 1 << 0;
    pub const COMMIT_MASTER: u8 = 1 << 1;
    pub const UPDATE_ONLY: u8 = 1 << 3;
    pub const REPLACE_ONLY: u8 = 1 << 4;
}

/// The 22-byte header shared by every record-message request and reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageHeader {
    pub info1: u8,
    pub info2: u8,
    pub info3: u8,
    pub result_code: i8,
    pub generation: u32,
    pub record_ttl: u32,
    pub transaction_ttl: u32,
    pub n_fields: u16,
    pub n_ops: u16,
}

impl MessageHeader {
    pub fn write<B: WriteBytesExt>(&self, buf: &mut B) -> IoResult<()> {
        UInt8.encode(buf, HEADER_SIZE)?;
        UInt8.encode(buf, self.info1)?;
        UInt8.encode(buf, self.info2)?;
        UInt8.encode(buf, self.info3)?;
        UInt8.encode(buf, 0)?; // unused
        Int8.encode(buf, self.result_code)?;
        UInt32.encode(buf, self.generation)?;
        UInt32.encode(buf, self.record_ttl)?;
        UInt32.encode(buf, self.transaction_ttl)?;
        UInt16.encode(buf, self.n_fields)?;
        UInt16.encode(buf, self.n_ops)
    }

    pub fn read<B: ReadBytesExt>(buf: &mut B) -> IoResult<Self> {
        let header_size = UInt8.decode(buf)?;
        if header_size != HEADER_SIZE {
            return Err(err_codec(format!(
                "unexpected message header size {header_size}, expected {HEADER_SIZE}"
            )));
        }
        let info1 = UInt8.decode(buf)?;
        let info2 = UInt8.decode(buf)?;
        let info3 = UInt8.decode(buf)?;
        let _unused = UInt8.decode(buf)?;
        let result_code = Int8.decode(buf)?;
        let generation = UInt32.decode(buf)?;
        let record_ttl = UInt32.decode(buf)?;
        let transaction_ttl = UInt32.decode(buf)?;
        let n_fields = UInt16.decode(buf)?;
        let n_ops = UInt16.decode(buf)?;
        Ok(MessageHeader {
            info1,
            info2,
            info3,
            result_code,
            generation,
            record_ttl,
            transaction_ttl,
            n_fields,
            n_ops,
        })
    }
}

/// A full record message: header, field list, operation list.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub header: MessageHeader,
    pub fields: Vec<Field>,
    pub ops: Vec<Operation>,
}

impl Message {
    pub fn calculate_size(&self) -> usize {
        HEADER_SIZE as usize
            + self.fields.iter().map(|f| 4 + f.calculate_size()).sum::<usize>()
            + self.ops.iter().map(|o| 4 + o.calculate_size()).sum::<usize>()
    }

    pub fn write<B: WriteBytesExt>(&self, buf: &mut B) -> IoResult<()> {
        let mut header = self.header;
        header.n_fields = self.fields.len() as u16;
        header.n_ops = self.ops.len() as u16;
        header.write(buf)?;
        for field in &self.fields {
            field.write(buf)?;
        }
        for op in &self.ops {
            op.write(buf)?;
        }
        Ok(())
    }

    pub fn read<B: ReadBytesExt>(buf: &mut B) -> IoResult<Self> {
        let header = MessageHeader::read(buf)?;
        let fields = (0..header.n_fields)
            .map(|_| Field::read(buf))
            .collect::<IoResult<Vec<_>>>()?;
        let ops = (0..header.n_ops)
            .map(|_| Operation::read_one(buf))
            .collect::<IoResult<Vec<_>>>()?;
        Ok(Message { header, fields, ops })
    }
}
