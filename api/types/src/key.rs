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

use ripemd::Digest as _;
use ripemd::Ripemd160;

use crate::error::ClientError;
use crate::value::Value;

const MAX_NAMESPACE_LEN: usize = 31;
const MAX_SET_LEN: usize = 63;

/// Identifies a single record: namespace, optional set, user key, and the
/// 20-byte digest derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    pub namespace: String,
    pub set: String,
    pub user_key: Value,
    digest: [u8; 20],
}

impl Key {
    pub fn new(
        namespace: impl Into<String>,
        set: impl Into<String>,
        user_key: impl Into<Value>,
    ) -> error_stack::Result<Self, ClientError> {
        let namespace = namespace.into();
        let set = set.into();
        let user_key = user_key.into();

        if namespace.len() > MAX_NAMESPACE_LEN {
            return Err(ClientError::parameter(format!(
                "namespace {namespace:?} exceeds {MAX_NAMESPACE_LEN} bytes"
            ))
            .into());
        }
        if set.len() > MAX_SET_LEN {
            return Err(
                ClientError::parameter(format!("set {set:?} exceeds {MAX_SET_LEN} bytes")).into(),
            );
        }

        let digest = compute_digest(&set, &user_key)
            .ok_or_else(|| ClientError::parameter("key value is not digestible"))?;

        Ok(Key {
            namespace,
            set,
            user_key,
            digest,
        })
    }

    pub fn digest(&self) -> &[u8; 20] {
        &self.digest
    }
}

/// `digest(set, key) = RIPEMD160(set_bytes || type_tag(key) || key_bytes)`, with
/// the set portion omitted entirely when `set` is empty.
fn compute_digest(set: &str, user_key: &Value) -> Option<[u8; 20]> {
    let key_bytes = user_key.digest_bytes()?;

    let mut hasher = Ripemd160::new();
    if !set.is_empty() {
        hasher.update(set.as_bytes());
    }
    hasher.update([user_key.value_type() as u8]);
    hasher.update(&key_bytes);

    let mut out = [0u8; 20];
    out.copy_from_slice(&hasher.finalize());
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let a = Key::new("test", "demo", "K9").unwrap();
        let b = Key::new("test", "demo", "K9").unwrap();
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn digest_distinguishes_keys() {
        let a = Key::new("test", "demo", "K9").unwrap();
        let b = Key::new("test", "demo", "K10").unwrap();
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn empty_set_omits_set_bytes() {
        let with_set = Key::new("test", "", 42i64).unwrap();
        let direct = compute_digest("", &Value::Integer(42)).unwrap();
        assert_eq!(with_set.digest(), &direct);
    }

    #[test]
    fn oversized_namespace_is_rejected() {
        let ns = "n".repeat(MAX_NAMESPACE_LEN + 1);
        assert!(Key::new(ns, "demo", "K9").is_err());
    }
}
