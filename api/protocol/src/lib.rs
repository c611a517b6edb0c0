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

//! Pure, stateless (de)serialization of the Aerospike wire language: the
//! transport envelope, the record message header, the field and operation
//! catalogues, bin value encoding and the info text sub-protocol. No socket
//! I/O lives in this crate; see `aerospike-socket` and `aerospike-router`.

pub(crate) mod codec;
pub mod compression;
pub mod envelope;
pub mod fields;
pub mod fuzz;
pub mod info;
pub mod message;
pub mod ops;
pub mod result_code;
pub mod value_codec;

pub(crate) type IoResult<T> = std::io::Result<T>;
