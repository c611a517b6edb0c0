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

//! A corruption hook the router calls on every outgoing request body. Behind
//! the `fuzz-corrupt` feature it flips a random bit with a probability read
//! from `AEROSPIKE_FUZZ_CORRUPT_RATE` at call time; built without the feature
//! it's a no-op, so call sites never need their own `cfg`.

/// Flips one random bit in `buf` with probability `AEROSPIKE_FUZZ_CORRUPT_RATE`
/// (a float in `[0, 1]`, default `0`). No-op on an empty buffer or when the
/// feature is disabled.
pub fn maybe_corrupt(buf: &mut [u8]) {
    imp::maybe_corrupt(buf)
}

#[cfg(feature = "fuzz-corrupt")]
mod imp {
    use rand::Rng;

    pub fn maybe_corrupt(buf: &mut [u8]) {
        if buf.is_empty() {
            return;
        }
        let rate = corrupt_rate();
        if rate <= 0.0 {
            return;
        }
        let mut rng = rand::thread_rng();
        if rng.gen::<f64>() >= rate {
            return;
        }
        let byte_index = rng.gen_range(0..buf.len());
        let bit = 1u8 << rng.gen_range(0..8);
        buf[byte_index] ^= bit;
    }

    fn corrupt_rate() -> f64 {
        std::env::var("AEROSPIKE_FUZZ_CORRUPT_RATE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0)
    }
}

#[cfg(not(feature = "fuzz-corrupt"))]
mod imp {
    pub fn maybe_corrupt(_buf: &mut [u8]) {}
}
