//! Memory Tier Module
//!
//! Bounded in-process map from digest to entry with lazy expiration and
//! expiry-ordered eviction.

use std::collections::HashMap;

use crate::cache::expiry::{ExpiryIndex, ExpirySlot};
use crate::cache::CacheEntry;

#[derive(Debug)]
struct MemoryRecord<V> {
    entry: CacheEntry<V>,
    slot: ExpirySlot,
}

// == Memory Tier ==
/// In-memory storage whose size never exceeds `max_items`.
///
/// Not synchronized; the `CacheManager` wraps it in a mutex.
#[derive(Debug)]
pub struct MemoryTier<V> {
    /// Digest-keyed storage
    records: HashMap<String, MemoryRecord<V>>,
    /// Eviction order
    index: ExpiryIndex,
    /// Maximum number of entries allowed
    max_items: usize,
}

impl<V: Clone> MemoryTier<V> {
    // == Constructor ==
    /// Creates an empty tier holding at most `max_items` entries.
    ///
    /// A capacity of zero disables the tier: `put` stores nothing.
    pub fn new(max_items: usize) -> Self {
        Self {
            records: HashMap::new(),
            index: ExpiryIndex::new(),
            max_items,
        }
    }

    // == Get ==
    /// Returns the value stored under `digest`.
    ///
    /// An expired entry is removed on the spot and reported as a miss.
    pub fn get(&mut self, digest: &str) -> Option<V> {
        let record = self.records.get(digest)?;
        if record.entry.is_expired() {
            self.remove(digest);
            return None;
        }
        Some(record.entry.value.clone())
    }

    // == Put ==
    /// Stores `entry` under `digest`, replacing any previous entry.
    ///
    /// If the tier is full and `digest` is new, exactly one entry is evicted
    /// first: the one with the smallest `expires_at`, earliest inserted on
    /// ties.
    ///
    /// # Arguments
    /// * `digest` - Storage identifier of the entry
    /// * `entry` - Value and absolute expiry to store
    ///
    /// # Returns
    /// The digest evicted to make room, or `None` if nothing was evicted.
    pub fn put(&mut self, digest: String, entry: CacheEntry<V>) -> Option<String> {
        if self.max_items == 0 {
            return None;
        }

        let mut evicted = None;
        if let Some(previous) = self.records.remove(&digest) {
            self.index.remove(&previous.slot);
        } else if self.records.len() >= self.max_items {
            if let Some(victim) = self.index.evict_soonest() {
                self.records.remove(&victim);
                evicted = Some(victim);
            }
        }

        let slot = self.index.insert(&digest, entry.expires_at);
        self.records.insert(digest, MemoryRecord { entry, slot });
        evicted
    }

    // == Remove ==
    /// Removes `digest`, returning whether it was present.
    pub fn remove(&mut self, digest: &str) -> bool {
        match self.records.remove(digest) {
            Some(record) => {
                self.index.remove(&record.slot);
                true
            }
            None => false,
        }
    }

    /// Removes every entry accepted by `matches(digest, original_key)`.
    ///
    /// Returns the removed digests.
    pub fn remove_matching<F>(&mut self, matches: F) -> Vec<String>
    where
        F: Fn(&str, Option<&str>) -> bool,
    {
        let doomed: Vec<String> = self
            .records
            .iter()
            .filter(|(digest, record)| matches(digest, record.entry.key.as_deref()))
            .map(|(digest, _)| digest.clone())
            .collect();

        for digest in &doomed {
            self.remove(digest);
        }
        doomed
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }

    /// Presence check that neither expires nor reorders anything.
    pub fn contains(&self, digest: &str) -> bool {
        self.records.contains_key(digest)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
