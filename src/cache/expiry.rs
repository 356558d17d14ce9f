//! Expiry Index Module
//!
//! Orders memory-tier entries for eviction: soonest `expires_at` first, ties
//! broken by insertion order. This is not LRU; reads never reorder entries.

use std::cmp::Ordering;
use std::collections::BTreeMap;

// == Expiry Slot ==
/// Position of one entry in the eviction order.
#[derive(Debug, Clone, Copy)]
pub struct ExpirySlot {
    expires_at: f64,
    seq: u64,
}

impl PartialEq for ExpirySlot {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ExpirySlot {}

impl PartialOrd for ExpirySlot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExpirySlot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.expires_at
            .total_cmp(&other.expires_at)
            .then(self.seq.cmp(&other.seq))
    }
}

// == Expiry Index ==
/// Tracks digests sorted by (expires_at, insertion sequence).
#[derive(Debug, Default)]
pub struct ExpiryIndex {
    order: BTreeMap<ExpirySlot, String>,
    next_seq: u64,
}

impl ExpiryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert ==
    /// Registers `digest` and returns its slot.
    ///
    /// Every call takes a fresh sequence number, so a re-inserted digest
    /// counts as the newest among equal expiries. The caller must `remove`
    /// any previous slot for the same digest.
    pub fn insert(&mut self, digest: &str, expires_at: f64) -> ExpirySlot {
        let slot = ExpirySlot {
            expires_at,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.order.insert(slot, digest.to_string());
        slot
    }

    // == Remove ==
    pub fn remove(&mut self, slot: &ExpirySlot) -> Option<String> {
        self.order.remove(slot)
    }

    // == Evict Soonest ==
    /// Returns and removes the digest that expires first.
    ///
    /// Returns None if the index is empty.
    pub fn evict_soonest(&mut self) -> Option<String> {
        self.order.pop_first().map(|(_, digest)| digest)
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
