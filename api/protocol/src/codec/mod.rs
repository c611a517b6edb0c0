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

//! Low-level byte-order primitives the higher envelope/message modules build on.
//! Every multi-byte integer on the wire is big-endian; nothing here ever
//! transmutes a struct, so alignment never enters the picture.

use std::error;
use std::io;
use std::mem::size_of;

use byteorder::BigEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::IoResult;

pub(crate) fn err_codec<E>(message: E) -> io::Error
where
    E: Into<Box<dyn error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, message)
}

pub(crate) trait Decoder<T: Sized> {
    fn decode<B: ReadBytesExt>(&self, buf: &mut B) -> IoResult<T>;
}

pub(crate) trait Encoder<T> {
    fn encode<B: WriteBytesExt>(&self, buf: &mut B, value: T) -> IoResult<()>;
    fn calculate_size(&self, value: T) -> usize;
}

pub(crate) trait FixedSizeEncoder {
    const SIZE: usize;
}

macro_rules! define_ints_codec {
    ($name:ident, $ty:ty, $write:ident, $read:ident $(,)? $($endian:ident)?) => {
        #[derive(Debug, Copy, Clone)]
        pub(crate) struct $name;

        impl Decoder<$ty> for $name {
            fn decode<B: ReadBytesExt>(&self, buf: &mut B) -> IoResult<$ty> {
                buf.$read$(::<$endian>)?()
            }
        }

        impl Encoder<$ty> for $name {
            fn encode<B: WriteBytesExt>(&self, buf: &mut B, value: $ty) -> IoResult<()> {
                buf.$write$(::<$endian>)?(value)
            }

            #[inline]
            fn calculate_size(&self, _: $ty) -> usize {
                Self::SIZE
            }
        }

        impl FixedSizeEncoder for $name {
            const SIZE: usize = size_of::<$ty>();
        }
    };
}

define_ints_codec!(Int8, i8, write_i8, read_i8);
define_ints_codec!(UInt8, u8, write_u8, read_u8);
define_ints_codec!(UInt16, u16, write_u16, read_u16, BigEndian);
define_ints_codec!(UInt32, u32, write_u32, read_u32, BigEndian);
define_ints_codec!(UInt64, u64, write_u64, read_u64, BigEndian);
define_ints_codec!(Int64, i64, write_i64, read_i64, BigEndian);
define_ints_codec!(Float64, f64, write_f64, read_f64, BigEndian);

/// A 48-bit big-endian unsigned integer, used only by the transport envelope's
/// payload-size field.
#[derive(Debug, Copy, Clone)]
pub(crate) struct UInt48;

impl Decoder<u64> for UInt48 {
    fn decode<B: ReadBytesExt>(&self, buf: &mut B) -> IoResult<u64> {
        let hi = buf.read_u16::<BigEndian>()? as u64;
        let lo = buf.read_u32::<BigEndian>()? as u64;
        Ok((hi << 32) | lo)
    }
}

impl Encoder<u64> for UInt48 {
    fn encode<B: WriteBytesExt>(&self, buf: &mut B, value: u64) -> IoResult<()> {
        if value >= (1u64 << 48) {
            return Err(err_codec(format!("value {value} does not fit in 48 bits")));
        }
        buf.write_u16::<BigEndian>((value >> 32) as u16)?;
        buf.write_u32::<BigEndian>(value as u32)
    }

    fn calculate_size(&self, _: u64) -> usize {
        6
    }
}

pub(crate) fn read_exact_vec<B: ReadBytesExt>(buf: &mut B, len: usize) -> IoResult<Vec<u8>> {
    let mut v = vec![0u8; len];
    buf.read_exact(&mut v)
        .map_err(|e| err_codec(format!("failed to read {len} bytes: {e}")))?;
    Ok(v)
}
