//! In-memory form of a state tree.
//!
//! Trees built while saving own all of their data (`TreeObject<'static>`). Trees decoded while
//! restoring borrow keys and blob bytes from the loaded buffer, so they cannot outlive it.

use std::borrow::Cow;

use crate::error::{Result, StateError};
use crate::format::MAX_OBJECT_ENTRIES;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<'a> {
    Blob(Cow<'a, [u8]>),
    Object(TreeObject<'a>),
}

impl<'a> Payload<'a> {
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Payload::Blob(bytes) => Some(&**bytes),
            Payload::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&TreeObject<'a>> {
        match self {
            Payload::Object(obj) => Some(obj),
            Payload::Blob(_) => None,
        }
    }

    pub fn into_owned(self) -> Payload<'static> {
        match self {
            Payload::Blob(bytes) => Payload::Blob(Cow::Owned(bytes.into_owned())),
            Payload::Object(obj) => Payload::Object(obj.into_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<'a> {
    pub key: Cow<'a, str>,
    pub payload: Payload<'a>,
}

/// Insertion-ordered collection of uniquely keyed entries with a declared capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeObject<'a> {
    capacity: usize,
    entries: Vec<Entry<'a>>,
}

impl<'a> TreeObject<'a> {
    /// Creates an empty object that accepts at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity > MAX_OBJECT_ENTRIES {
            return Err(StateError::CapacityTooLarge { capacity });
        }
        Ok(Self {
            capacity,
            entries: Vec::new(),
        })
    }

    /// Wraps already-validated entries; capacity equals the entry count.
    pub(crate) fn from_entries(entries: Vec<Entry<'a>>) -> Self {
        Self {
            capacity: entries.len(),
            entries,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn entries(&self) -> &[Entry<'a>] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry<'a>> {
        self.entries.iter()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Payload<'a>> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.payload)
    }

    pub fn get_blob(&self, key: &str) -> Option<&[u8]> {
        self.get(key).and_then(Payload::as_blob)
    }

    pub fn get_object(&self, key: &str) -> Option<&TreeObject<'a>> {
        self.get(key).and_then(Payload::as_object)
    }

    /// Checks that `key` could be inserted right now without inserting it.
    pub fn check_insert(&self, key: &str) -> Result<()> {
        if self.contains_key(key) {
            return Err(StateError::DuplicateKey(key.to_string()));
        }
        if self.is_full() {
            return Err(StateError::CapacityExhausted {
                key: key.to_string(),
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Appends an entry. On error the object is left unchanged.
    pub fn insert(&mut self, key: impl Into<Cow<'a, str>>, payload: Payload<'a>) -> Result<()> {
        let key = key.into();
        self.check_insert(&key)?;
        self.entries.push(Entry { key, payload });
        Ok(())
    }

    pub fn insert_blob(
        &mut self,
        key: impl Into<Cow<'a, str>>,
        bytes: impl Into<Cow<'a, [u8]>>,
    ) -> Result<()> {
        self.insert(key, Payload::Blob(bytes.into()))
    }

    pub fn insert_object(
        &mut self,
        key: impl Into<Cow<'a, str>>,
        obj: TreeObject<'a>,
    ) -> Result<()> {
        self.insert(key, Payload::Object(obj))
    }

    /// Deep-copies every borrowed key and blob so the tree no longer borrows its source buffer.
    pub fn into_owned(self) -> TreeObject<'static> {
        TreeObject {
            capacity: self.capacity,
            entries: self
                .entries
                .into_iter()
                .map(|entry| Entry {
                    key: Cow::Owned(entry.key.into_owned()),
                    payload: entry.payload.into_owned(),
                })
                .collect(),
        }
    }
}
