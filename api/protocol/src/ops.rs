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

//! Operator ids and the per-operation wire shape:
//! `[size:4 | op:1 | value_type:1 | version:1 | name_len:1 | name | value]`.

use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::codec::err_codec;
use crate::codec::read_exact_vec;
use crate::codec::Decoder;
use crate::codec::Encoder;
use crate::codec::Int8;
use crate::codec::UInt32;
use crate::codec::UInt8;
use crate::value_codec;
use crate::IoResult;
use aerospike_types::Value;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum OperatorType {
    Read = 1,
    Write = 2,
    Increment = 5,
    Append = 9,
    Prepend = 10,
    Touch = 11,
    CdtList = 0x50,
    CdtMap = 0x55,
    CdtBit = 0x60,
    CdtHll = 0x67,
    Expression = 0x98,
}

impl TryFrom<u8> for OperatorType {
    type Error = std::io::Error;

    fn try_from(tag: u8) -> IoResult<Self> {
        Ok(match tag {
            1 => OperatorType::Read,
            2 => OperatorType::Write,
            5 => OperatorType::Increment,
            9 => OperatorType::Append,
            10 => OperatorType::Prepend,
            11 => OperatorType::Touch,
            0x50 => OperatorType::CdtList,
            0x55 => OperatorType::CdtMap,
            0x60 => OperatorType::CdtBit,
            0x67 => OperatorType::CdtHll,
            0x98 => OperatorType::Expression,
            other => return Err(err_codec(format!("unknown operator {other:#04x}"))),
        })
    }
}

/// One entry in a record message's operation list.
#[derive(Debug, Clone)]
pub struct Operation {
    pub op: OperatorType,
    pub bin_name: String,
    pub value: Value,
}

impl Operation {
    pub fn read(bin_name: impl Into<String>) -> Self {
        Operation {
            op: OperatorType::Read,
            bin_name: bin_name.into(),
            value: Value::Nil,
        }
    }

    pub fn read_all() -> Self {
        Operation::read("")
    }

    pub fn write(bin_name: impl Into<String>, value: Value) -> Self {
        Operation {
            op: OperatorType::Write,
            bin_name: bin_name.into(),
            value,
        }
    }

    pub fn touch() -> Self {
        Operation {
            op: OperatorType::Touch,
            bin_name: String::new(),
            value: Value::Nil,
        }
    }

    pub fn calculate_size(&self) -> usize {
        // size field itself is not counted in the size it declares
        1 + 1 + 1 + 1 + self.bin_name.len() + value_codec::calculate_size(&self.value)
    }

    pub fn write<B: WriteBytesExt>(&self, buf: &mut B) -> IoResult<()> {
        let body_size = self.calculate_size();
        UInt32.encode(buf, body_size as u32)?;
        UInt8.encode(buf, self.op as u8)?;
        UInt8.encode(buf, self.value.value_type() as u8)?;
        Int8.encode(buf, 0)?; // version, unused
        UInt8.encode(buf, self.bin_name.len() as u8)?;
        buf.write_all(self.bin_name.as_bytes())?;
        value_codec::write(buf, &self.value)
    }

    pub fn read_one<B: ReadBytesExt>(buf: &mut B) -> IoResult<Self> {
        let size = UInt32.decode(buf)? as usize;
        let op = OperatorType::try_from(UInt8.decode(buf)?)?;
        let value_type = UInt8.decode(buf)?;
        let _version = Int8.decode(buf)?;
        let name_len = UInt8.decode(buf)? as usize;
        let name_bytes = read_exact_vec(buf, name_len)?;
        let bin_name = String::from_utf8_lossy(&name_bytes).into_owned();

        let consumed_header = 1 + 1 + 1 + 1 + name_len;
        if size < consumed_header {
            return Err(err_codec("operation size smaller than its own header"));
        }
        let value_len = size - consumed_header;
        let value = value_codec::read(buf, value_type, value_len)?;

        Ok(Operation {
            op,
            bin_name,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn write_read_round_trips() {
        let op = Operation::write("B1", Value::Integer(7));
        let mut buf = vec![];
        op.write(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded = Operation::read_one(&mut cursor).unwrap();
        assert_eq!(decoded.bin_name, "B1");
        assert_eq!(decoded.value, Value::Integer(7));
        assert_eq!(decoded.op, OperatorType::Write);
    }
}
