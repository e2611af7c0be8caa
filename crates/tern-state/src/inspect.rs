//! Read-only summaries of encoded state, used by tooling.

use crate::codec::decode_state;
use crate::error::Result;
use crate::format::StateHeader;
use crate::tree::{Payload, TreeObject};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StateSummary {
    pub magic: u32,
    pub version: u32,
    pub root: Vec<SummaryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SummaryEntry {
    pub key: String,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub kind: EntryKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(tag = "kind", rename_all = "snake_case")
)]
pub enum EntryKind {
    Blob { len: usize },
    Object { entries: Vec<SummaryEntry> },
}

impl StateSummary {
    pub fn header(&self) -> StateHeader {
        StateHeader {
            magic: self.magic,
            version: self.version,
        }
    }

    /// Number of entries at every level, objects included.
    pub fn entry_count(&self) -> usize {
        fn count(entries: &[SummaryEntry]) -> usize {
            entries
                .iter()
                .map(|entry| match &entry.kind {
                    EntryKind::Blob { .. } => 1,
                    EntryKind::Object { entries } => 1 + count(entries),
                })
                .sum()
        }
        count(&self.root)
    }

    /// Sum of all blob payload lengths.
    pub fn blob_bytes(&self) -> usize {
        fn bytes(entries: &[SummaryEntry]) -> usize {
            entries
                .iter()
                .map(|entry| match &entry.kind {
                    EntryKind::Blob { len } => *len,
                    EntryKind::Object { entries } => bytes(entries),
                })
                .sum()
        }
        bytes(&self.root)
    }
}

/// Decodes `bytes` and describes the shape of the tree without copying any payload.
pub fn inspect_state(bytes: &[u8]) -> Result<StateSummary> {
    // `decode_state` only accepts the one supported header.
    let root = decode_state(bytes)?;
    let header = StateHeader::default();
    Ok(StateSummary {
        magic: header.magic,
        version: header.version,
        root: summarize(&root),
    })
}

fn summarize(obj: &TreeObject<'_>) -> Vec<SummaryEntry> {
    obj.iter()
        .map(|entry| SummaryEntry {
            key: entry.key.to_string(),
            kind: match &entry.payload {
                Payload::Blob(bytes) => EntryKind::Blob { len: bytes.len() },
                Payload::Object(child) => EntryKind::Object {
                    entries: summarize(child),
                },
            },
        })
        .collect()
}

/// Follows a `/`-separated chain of keys from `root`.
///
/// An empty path (or one made only of separators) is `None`; use `root` directly instead.
pub fn lookup<'t, 'a>(root: &'t TreeObject<'a>, key_path: &str) -> Option<&'t Payload<'a>> {
    let mut keys = key_path.split('/').filter(|key| !key.is_empty());
    let mut payload = root.get(keys.next()?)?;
    for key in keys {
        payload = payload.as_object()?.get(key)?;
    }
    Some(payload)
}
