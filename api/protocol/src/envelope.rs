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

//! The outer 8-byte transport header every request and reply is wrapped in:
//! `[version:8 | type:8 | size:48]`, big-endian.

use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::codec::err_codec;
use crate::codec::Decoder;
use crate::codec::Encoder;
use crate::codec::UInt48;
use crate::codec::UInt8;
use crate::IoResult;

pub const PROTO_VERSION: u8 = 2;

/// Messages larger than this (inflated, for a compressed envelope) are rejected
/// by both sides of the wire.
pub const MAX_PAYLOAD_SIZE: u64 = 128 * 1024 * 1024;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum EnvelopeType {
    Info = 1,
    Admin = 2,
    Record = 3,
    Compressed = 4,
}

impl TryFrom<u8> for EnvelopeType {
    type Error = std::io::Error;

    fn try_from(tag: u8) -> IoResult<Self> {
        match tag {
            1 => Ok(EnvelopeType::Info),
            2 => Ok(EnvelopeType::Admin),
            3 => Ok(EnvelopeType::Record),
            4 => Ok(EnvelopeType::Compressed),
            other => Err(err_codec(format!("unknown envelope type {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    pub kind: EnvelopeType,
    pub payload_size: u64,
}

impl Envelope {
    pub const HEADER_SIZE: usize = 8;

    pub fn read<B: ReadBytesExt>(buf: &mut B) -> IoResult<Self> {
        let version = UInt8.decode(buf)?;
        if version != PROTO_VERSION {
            return Err(err_codec(format!(
                "unsupported protocol version {version}, expected {PROTO_VERSION}"
            )));
        }
        let kind = EnvelopeType::try_from(UInt8.decode(buf)?)?;
        let payload_size = UInt48.decode(buf)?;
        if payload_size > MAX_PAYLOAD_SIZE {
            return Err(err_codec(format!(
                "payload size {payload_size} exceeds the {MAX_PAYLOAD_SIZE} byte limit"
            )));
        }
        Ok(Envelope { kind, payload_size })
    }

    pub fn write<B: WriteBytesExt>(&self, buf: &mut B) -> IoResult<()> {
        if self.payload_size > MAX_PAYLOAD_SIZE {
            return Err(err_codec(format!(
                "payload size {} exceeds the {MAX_PAYLOAD_SIZE} byte limit",
                self.payload_size
            )));
        }
        UInt8.encode(buf, PROTO_VERSION)?;
        UInt8.encode(buf, self.kind as u8)?;
        UInt48.encode(buf, self.payload_size)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn round_trips() {
        let env = Envelope {
            kind: EnvelopeType::Record,
            payload_size: 1234,
        };
        let mut buf = vec![];
        env.write(&mut buf).unwrap();
        assert_eq!(buf.len(), Envelope::HEADER_SIZE);

        let mut cursor = Cursor::new(buf);
        let decoded = Envelope::read(&mut cursor).unwrap();
        assert_eq!(decoded.kind, env.kind);
        assert_eq!(decoded.payload_size, env.payload_size);
    }

    #[test]
    fn rejects_oversized_payload() {
        let env = Envelope {
            kind: EnvelopeType::Record,
            payload_size: MAX_PAYLOAD_SIZE + 1,
        };
        let mut buf = vec![];
        assert!(env.write(&mut buf).is_err());
    }

    #[test]
    fn rejects_bad_version() {
        let mut buf = vec![9u8, 3, 0, 0, 0, 0, 0, 1];
        let mut cursor = Cursor::new(&mut buf);
        assert!(Envelope::read(&mut cursor).is_err());
    }
}
