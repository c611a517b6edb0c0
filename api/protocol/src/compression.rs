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

//! A `Compressed` envelope wraps a zlib-deflated inner envelope, prefixed by
//! the 8-byte big-endian size it inflates to. Only the transport layer uses
//! this; `Router` decides whether a given request is worth compressing based
//! on `ClientPolicy::compression_threshold_bytes`.

use std::io::Read;
use std::io::Write;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::codec::err_codec;
use crate::IoResult;

const UNCOMPRESSED_SIZE_PREFIX: usize = 8;

pub fn compress(plain: &[u8]) -> IoResult<Vec<u8>> {
    let mut out = Vec::with_capacity(UNCOMPRESSED_SIZE_PREFIX + plain.len());
    out.extend_from_slice(&(plain.len() as u64).to_be_bytes());

    let mut encoder = ZlibEncoder::new(out, Compression::default());
    encoder.write_all(plain)?;
    encoder.finish()
}

pub fn decompress(framed: &[u8]) -> IoResult<Vec<u8>> {
    if framed.len() < UNCOMPRESSED_SIZE_PREFIX {
        return Err(err_codec("compressed envelope shorter than its size prefix"));
    }
    let (size_bytes, body) = framed.split_at(UNCOMPRESSED_SIZE_PREFIX);
    let expected_len = u64::from_be_bytes(size_bytes.try_into().expect("8 byte slice")) as usize;

    let mut decoder = ZlibDecoder::new(body);
    let mut plain = Vec::with_capacity(expected_len);
    decoder.read_to_end(&mut plain)?;

    if plain.len() != expected_len {
        return Err(err_codec(format!(
            "decompressed {} bytes, expected {expected_len}",
            plain.len()
        )));
    }
    Ok(plain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let plain = b"hello, this is a record payload worth compressing".to_vec();
        let framed = compress(&plain).unwrap();
        let decoded = decompress(&framed).unwrap();
        assert_eq!(decoded, plain);
    }

    #[test]
    fn rejects_truncated_prefix() {
        assert!(decompress(&[0u8; 4]).is_err());
    }

    #[test]
    fn rejects_size_mismatch() {
        let mut framed = compress(b"abc").unwrap();
        framed[7] = 200; // lie about the uncompressed size
        assert!(decompress(&framed).is_err());
    }
}
