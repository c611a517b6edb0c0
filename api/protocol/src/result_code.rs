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

//! The server's result-code table, carried in the record-message header.
//! 0 means success; everything else maps to an [`aerospike_types::ErrorKind::Server`].

pub const OK: i8 = 0;
pub const SERVER_ERROR: i8 = 1;
pub const KEY_NOT_FOUND: i8 = 2;
pub const GENERATION_ERROR: i8 = 3;
pub const PARAMETER_ERROR: i8 = 4;
pub const KEY_EXISTS_ERROR: i8 = 5;
pub const BIN_EXISTS_ERROR: i8 = 6;
pub const CLUSTER_KEY_MISMATCH: i8 = 7;
pub const SERVER_MEM_ERROR: i8 = 8;
pub const TIMEOUT: i8 = 9;
pub const NO_XDR: i8 = 10;
pub const SERVER_NOT_AVAILABLE: i8 = 11;
pub const BIN_TYPE_ERROR: i8 = 12;
pub const RECORD_TOO_BIG: i8 = 13;
pub const KEY_BUSY: i8 = 14;
pub const SCAN_ABORT: i8 = 15;
pub const UNSUPPORTED_FEATURE: i8 = 16;
pub const BIN_NOT_FOUND: i8 = 17;
pub const DEVICE_OVERLOAD: i8 = 18;
pub const KEY_MISMATCH: i8 = 19;
pub const INVALID_NAMESPACE: i8 = 20;
pub const BIN_NAME_TOO_LONG: i8 = 21;
pub const FAIL_FORBIDDEN: i8 = 22;
pub const FAIL_ELEMENT_NOT_FOUND: i8 = 23;
pub const FAIL_ELEMENT_EXISTS: i8 = 24;
pub const UDF_BAD_RESPONSE: i8 = 100;
pub const QUERY_END: i8 = 50;
pub const SECURITY_NOT_SUPPORTED: i8 = 51;
pub const SECURITY_NOT_ENABLED: i8 = 52;
pub const INVALID_CREDENTIAL: i8 = 62;
pub const EXPIRED_SESSION: i8 = 63;
pub const INVALID_ROLE: i8 = 70;
pub const ROLE_ALREADY_EXISTS: i8 = 71;
pub const INVALID_PRIVILEGE: i8 = 72;
pub const NOT_AUTHENTICATED: i8 = 80;
pub const ROLE_VIOLATION: i8 = 81;
pub const INDEX_FOUND: i8 = 200;
pub const INDEX_NOT_FOUND: i8 = 201;
pub const INDEX_OOM: i8 = 202;

pub fn describe(code: i8) -> &'static str {
    match code {
        OK => "ok",
        SERVER_ERROR => "server error",
        KEY_NOT_FOUND => "key not found",
        GENERATION_ERROR => "generation mismatch",
        PARAMETER_ERROR => "parameter error",
        KEY_EXISTS_ERROR => "key already exists",
        BIN_EXISTS_ERROR => "bin already exists",
        CLUSTER_KEY_MISMATCH => "cluster key mismatch",
        SERVER_MEM_ERROR => "server out of memory",
        TIMEOUT => "timeout",
        NO_XDR => "xdr not available",
        SERVER_NOT_AVAILABLE => "server not available",
        BIN_TYPE_ERROR => "bin type mismatch",
        RECORD_TOO_BIG => "record too big",
        KEY_BUSY => "hot key",
        SCAN_ABORT => "scan aborted",
        UNSUPPORTED_FEATURE => "unsupported server feature",
        BIN_NOT_FOUND => "bin not found",
        DEVICE_OVERLOAD => "device overload",
        KEY_MISMATCH => "key mismatch",
        INVALID_NAMESPACE => "invalid namespace",
        BIN_NAME_TOO_LONG => "bin name too long",
        FAIL_FORBIDDEN => "operation forbidden",
        FAIL_ELEMENT_NOT_FOUND => "cdt element not found",
        FAIL_ELEMENT_EXISTS => "cdt element already exists",
        QUERY_END => "query end",
        SECURITY_NOT_SUPPORTED => "security not supported",
        SECURITY_NOT_ENABLED => "security not enabled",
        INVALID_CREDENTIAL => "invalid credential",
        EXPIRED_SESSION => "expired session",
        INVALID_ROLE => "invalid role",
        ROLE_ALREADY_EXISTS => "role already exists",
        INVALID_PRIVILEGE => "invalid privilege",
        NOT_AUTHENTICATED => "not authenticated",
        ROLE_VIOLATION => "role violation",
        INDEX_FOUND => "index already exists",
        INDEX_NOT_FOUND => "index not found",
        INDEX_OOM => "index out of memory",
        UDF_BAD_RESPONSE => "udf error",
        _ => "unknown server error",
    }
}
