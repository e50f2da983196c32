//! # Dedup Index
//!
//! Composite natural-key index over remote request records: the normalized
//! timestamp joined with the trimmed email. Used to decide whether a source
//! row already has a remote counterpart.

use crate::model::{RemoteId, RemoteRecord};
use crate::normalize::normalize_timestamp;
use chrono_tz::Tz;
use hashbrown::HashMap;
use tracing::debug;

/// Derived key `normalize(timestamp) + "_" + trim(email)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn new(timestamp: &str, email: &str, tz: Tz) -> Self {
        Self(format!("{}_{}", normalize_timestamp(timestamp, tz), email.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Index from dedup key to the first remote id seen with that key.
#[derive(Debug, Clone)]
pub struct DedupIndex {
    tz: Tz,
    keys: HashMap<DedupKey, RemoteId>,
    shadowed: usize,
}

impl DedupIndex {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            keys: HashMap::new(),
            shadowed: 0,
        }
    }

    /// Build the index from remote records, in the order given.
    pub fn build<'a, I>(records: I, tz: Tz) -> Self
    where
        I: IntoIterator<Item = &'a RemoteRecord>,
    {
        let mut index = Self::new(tz);
        for record in records {
            index.insert(record);
        }
        debug!(
            keys = index.len(),
            shadowed = index.shadowed,
            "dedup index built"
        );
        index
    }

    /// Index one record. Records lacking a timestamp or email are ignored,
    /// and a key that is already present keeps its first id.
    pub fn insert(&mut self, record: &RemoteRecord) -> bool {
        let (Some(timestamp), Some(email)) = (&record.timestamp, &record.email) else {
            return false;
        };
        let key = DedupKey::new(timestamp, email, self.tz);
        if self.keys.contains_key(&key) {
            self.shadowed += 1;
            return false;
        }
        self.keys.insert(key, record.id.clone());
        true
    }

    pub fn key_for(&self, timestamp: &str, email: &str) -> DedupKey {
        DedupKey::new(timestamp, email, self.tz)
    }

    pub fn get(&self, key: &DedupKey) -> Option<&RemoteId> {
        self.keys.get(key)
    }

    /// Look up by raw timestamp and email.
    pub fn lookup(&self, timestamp: &str, email: &str) -> Option<&RemoteId> {
        self.get(&self.key_for(timestamp, email))
    }

    /// Number of records whose key was already taken by an earlier record.
    pub fn shadowed(&self) -> usize {
        self.shadowed
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
