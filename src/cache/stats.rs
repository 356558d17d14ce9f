//! Cache Statistics Module
//!
//! Point-in-time tier sizes plus running hit/miss/eviction counters.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Cache Stats ==
/// Snapshot returned by `CacheManager::get_stats`.
///
/// Counts are read without coordination against concurrent mutation.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Entries currently held in memory (expired ones included until read)
    pub memory_items: usize,
    /// Data files currently on disk
    pub disk_items: usize,
    /// Memory tier capacity
    pub memory_limit: usize,
    /// Cache root directory
    pub cache_dir: PathBuf,
    /// Lookups answered by the memory tier
    pub memory_hits: u64,
    /// Lookups answered by the disk tier
    pub disk_hits: u64,
    /// Lookups answered by neither tier
    pub misses: u64,
    /// Entries evicted from memory to make room
    pub evictions: u64,
    pub collected_at: DateTime<Utc>,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate across both tiers.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.disk_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

// == Cache Counters ==
/// Lock-free counters shared by concurrent cache operations.
#[derive(Debug, Default)]
pub struct CacheCounters {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disk_hit(&self) {
        self.disk_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Builds a snapshot from the counters and the given tier sizes.
    pub fn snapshot(
        &self,
        memory_items: usize,
        disk_items: usize,
        memory_limit: usize,
        cache_dir: PathBuf,
    ) -> CacheStats {
        CacheStats {
            memory_items,
            disk_items,
            memory_limit,
            cache_dir,
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            collected_at: Utc::now(),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(counters: &CacheCounters) -> CacheStats {
        counters.snapshot(0, 0, 10, PathBuf::from("/tmp/cache"))
    }

    #[test]
    fn test_counters_start_at_zero() {
        let stats = snapshot(&CacheCounters::new());
        assert_eq!(stats.memory_hits, 0);
        assert_eq!(stats.disk_hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.memory_limit, 10);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(snapshot(&CacheCounters::new()).hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed_tiers() {
        let counters = CacheCounters::new();
        counters.record_memory_hit();
        counters.record_disk_hit();
        counters.record_miss();
        counters.record_miss();
        assert_eq!(snapshot(&counters).hit_rate(), 0.5);
    }

    #[test]
    fn test_record_eviction() {
        let counters = CacheCounters::new();
        counters.record_eviction();
        counters.record_eviction();
        assert_eq!(snapshot(&counters).evictions, 2);
    }

    #[test]
    fn test_stats_serialize() {
        let json = serde_json::to_value(snapshot(&CacheCounters::new())).unwrap();
        assert_eq!(json["cache_dir"], "/tmp/cache");
        assert_eq!(json["memory_limit"], 10);
        assert!(json["collected_at"].is_string());
    }
}
