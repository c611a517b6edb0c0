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

//! Which partitions a scan or query should cover, and the serialized
//! checkpoint ([`PartitionsStatus`]) a caller can stash and later resume a
//! truncated stream from.

/// Selects which partitions a scan/query command should read. Encoded into a
/// single wire field (`FieldType::PartitionFilter`) ahead of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionFilter {
    /// Every partition in the namespace.
    All,
    /// Exactly one partition.
    Id(u16),
    /// `count` consecutive partitions starting at `begin`.
    Range { begin: u16, count: u16 },
    /// Resume a single partition strictly after `digest`, in digest order
    /// rather than user-key order.
    AfterDigest { partition_id: u16, digest: [u8; 20] },
    /// Resume from a checkpoint captured mid-stream.
    Resume(PartitionsStatus),
}

const TAG_ALL: u8 = 0;
const TAG_ID: u8 = 1;
const TAG_RANGE: u8 = 2;
const TAG_AFTER_DIGEST: u8 = 3;
const TAG_RESUME: u8 = 4;

impl PartitionFilter {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            PartitionFilter::All => out.push(TAG_ALL),
            PartitionFilter::Id(id) => {
                out.push(TAG_ID);
                out.extend_from_slice(&id.to_be_bytes());
            }
            PartitionFilter::Range { begin, count } => {
                out.push(TAG_RANGE);
                out.extend_from_slice(&begin.to_be_bytes());
                out.extend_from_slice(&count.to_be_bytes());
            }
            PartitionFilter::AfterDigest { partition_id, digest } => {
                out.push(TAG_AFTER_DIGEST);
                out.extend_from_slice(&partition_id.to_be_bytes());
                out.extend_from_slice(digest);
            }
            PartitionFilter::Resume(status) => {
                out.push(TAG_RESUME);
                out.extend_from_slice(&status.to_bytes());
            }
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&tag, rest) = bytes.split_first()?;
        match tag {
            TAG_ALL => Some(PartitionFilter::All),
            TAG_ID => {
                let id = u16::from_be_bytes(rest.get(0..2)?.try_into().ok()?);
                Some(PartitionFilter::Id(id))
            }
            TAG_RANGE => {
                let begin = u16::from_be_bytes(rest.get(0..2)?.try_into().ok()?);
                let count = u16::from_be_bytes(rest.get(2..4)?.try_into().ok()?);
                Some(PartitionFilter::Range { begin, count })
            }
            TAG_AFTER_DIGEST => {
                let partition_id = u16::from_be_bytes(rest.get(0..2)?.try_into().ok()?);
                let digest: [u8; 20] = rest.get(2..22)?.try_into().ok()?;
                Some(PartitionFilter::AfterDigest { partition_id, digest })
            }
            TAG_RESUME => PartitionsStatus::from_bytes(rest).map(PartitionFilter::Resume),
            _ => None,
        }
    }
}

/// Per-partition completion checkpoint for a paginated scan/query, opaque to
/// the caller but required to round-trip byte-identically so pagination
/// resumes exactly once per record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionsStatus {
    pub part_begin: u16,
    pub part_count: u16,
    pub done: bool,
    pub retry: bool,
    pub entries: Vec<PartitionStatusEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionStatusEntry {
    pub id: u16,
    pub retry: bool,
    pub digest_init: bool,
    pub digest: [u8; 20],
    pub bval: u64,
}

const ENTRY_SIZE: usize = 2 + 1 + 1 + 20 + 8;

impl PartitionsStatus {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(6 + self.entries.len() * ENTRY_SIZE);
        out.extend_from_slice(&self.part_begin.to_be_bytes());
        out.extend_from_slice(&self.part_count.to_be_bytes());
        out.push(self.done as u8);
        out.push(self.retry as u8);
        for entry in &self.entries {
            out.extend_from_slice(&entry.id.to_be_bytes());
            out.push(entry.retry as u8);
            out.push(entry.digest_init as u8);
            out.extend_from_slice(&entry.digest);
            out.extend_from_slice(&entry.bval.to_be_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let part_begin = u16::from_be_bytes(bytes.get(0..2)?.try_into().ok()?);
        let part_count = u16::from_be_bytes(bytes.get(2..4)?.try_into().ok()?);
        let done = *bytes.get(4)? != 0;
        let retry = *bytes.get(5)? != 0;

        let mut entries = Vec::with_capacity(part_count as usize);
        let mut offset = 6;
        for _ in 0..part_count {
            let entry_bytes = bytes.get(offset..offset + ENTRY_SIZE)?;
            let id = u16::from_be_bytes(entry_bytes[0..2].try_into().ok()?);
            let retry = entry_bytes[2] != 0;
            let digest_init = entry_bytes[3] != 0;
            let digest: [u8; 20] = entry_bytes[4..24].try_into().ok()?;
            let bval = u64::from_be_bytes(entry_bytes[24..32].try_into().ok()?);
            entries.push(PartitionStatusEntry {
                id,
                retry,
                digest_init,
                digest,
                bval,
            });
            offset += ENTRY_SIZE;
        }

        Some(PartitionsStatus {
            part_begin,
            part_count,
            done,
            retry,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_status_round_trips_byte_identically() {
        let status = PartitionsStatus {
            part_begin: 0,
            part_count: 2,
            done: false,
            retry: true,
            entries: vec![
                PartitionStatusEntry {
                    id: 0,
                    retry: false,
                    digest_init: true,
                    digest: [1u8; 20],
                    bval: 42,
                },
                PartitionStatusEntry {
                    id: 1,
                    retry: true,
                    digest_init: false,
                    digest: [2u8; 20],
                    bval: 7,
                },
            ],
        };

        let bytes = status.to_bytes();
        let decoded = PartitionsStatus::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, status);
    }

    #[test]
    fn partition_filter_variants_round_trip() {
        let filters = vec![
            PartitionFilter::All,
            PartitionFilter::Id(17),
            PartitionFilter::Range { begin: 10, count: 100 },
            PartitionFilter::AfterDigest {
                partition_id: 3,
                digest: [9u8; 20],
            },
        ];
        for filter in filters {
            let bytes = filter.to_bytes();
            assert_eq!(PartitionFilter::from_bytes(&bytes), Some(filter));
        }
    }
}
