//! Cache Manager Module
//!
//! Façade composing the memory tier, the disk tier and the I/O pool. Callers
//! only talk to `CacheManager`: lookups consult memory first, fall back to
//! disk and warm memory on a disk hit.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::cache::digest::digest_key;
use crate::cache::disk::{DiskMeta, DiskTier};
use crate::cache::entry::CacheEntry;
use crate::cache::memory::MemoryTier;
use crate::cache::pool::IoPool;
use crate::cache::stats::{CacheCounters, CacheStats};
use crate::cache::CacheValue;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Cache Manager ==
/// Two-tier cache for values of type `V`.
///
/// Owns its cache directory; two managers on the same directory are not
/// coordinated. Disk operations on the same key are serialized by the disk
/// tier, so concurrent writers never leave a torn pair; the last write wins.
pub struct CacheManager<V: CacheValue> {
    config: CacheConfig,
    memory: Mutex<MemoryTier<V>>,
    disk: Arc<DiskTier>,
    pool: IoPool,
    counters: CacheCounters,
}

impl<V: CacheValue> CacheManager<V> {
    // == Open ==
    /// Validates `config`, creates the directory layout and returns a ready
    /// manager. Directory creation runs on the I/O pool.
    pub async fn open(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let disk = Arc::new(DiskTier::new(config.cache_root.clone()));
        let pool = IoPool::new(config.worker_pool_size);

        let init = Arc::clone(&disk);
        pool.run("init", move || init.init()).await?;

        info!(
            "Cache manager initialized with directory: {}, max_memory_items={}, default_ttl={}s, workers={}",
            config.cache_root.display(),
            config.max_memory_items,
            config.default_ttl,
            config.worker_pool_size
        );

        Ok(Self {
            memory: Mutex::new(MemoryTier::new(config.max_memory_items)),
            disk,
            pool,
            counters: CacheCounters::new(),
            config,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Get ==
    /// Looks `key` up in memory, then on disk.
    ///
    /// A disk hit copies the entry back into memory with its original expiry.
    /// Disk failures are logged and count as a miss.
    ///
    /// # Arguments
    /// * `key` - Application key; hashed before lookup
    ///
    /// # Returns
    /// - `Some(value)` from whichever tier holds a live entry
    /// - `None` if neither does, or if the disk could not be read
    pub async fn get(&self, key: &str) -> Option<V> {
        let digest = digest_key(key);

        let cached = self.memory().get(&digest);
        if let Some(value) = cached {
            self.counters.record_memory_hit();
            return Some(value);
        }

        let disk = Arc::clone(&self.disk);
        let job_digest = digest.clone();
        let loaded = self
            .pool
            .run("read", move || load_entry::<V>(&disk, &job_digest))
            .await;

        match loaded {
            Ok(Some(entry)) => {
                self.counters.record_disk_hit();
                let value = entry.value.clone();
                debug!(digest = %digest, "Warming memory tier from disk");
                self.put_memory(digest, entry);
                Some(value)
            }
            Ok(None) => {
                self.counters.record_miss();
                None
            }
            Err(err) => {
                if matches!(err, CacheError::CorruptEntry(_) | CacheError::Serialization(_)) {
                    warn!(digest = %digest, error = %err, "Dropped corrupt disk entry");
                } else {
                    error!(digest = %digest, error = %err, "Error reading from disk cache");
                }
                self.counters.record_miss();
                None
            }
        }
    }

    /// Returns the value for `key`, or `default` on a miss.
    pub async fn get_or(&self, key: &str, default: V) -> V {
        self.get(key).await.unwrap_or(default)
    }

    // == Set ==
    /// Stores `value` under `key` in both tiers.
    ///
    /// The memory write always happens. On a failed disk write the value
    /// stays readable from memory until it is evicted.
    ///
    /// # Arguments
    /// * `key` - Application key; hashed before storage
    /// * `value` - The value to store
    /// * `ttl` - Time to live; `None` uses the configured default, zero
    ///   expires the entry immediately
    ///
    /// # Returns
    /// Whether the disk write succeeded.
    pub async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> bool {
        let digest = digest_key(key);
        let entry = CacheEntry::new(
            value.clone(),
            ttl.unwrap_or_else(|| self.config.default_ttl_duration()),
            Some(key.to_string()),
        );
        let expires_at = entry.expires_at;
        self.put_memory(digest.clone(), entry);

        let disk = Arc::clone(&self.disk);
        let job_digest = digest.clone();
        let original_key = key.to_string();
        let written = self
            .pool
            .run("write", move || {
                let bytes = value.encode()?;
                let meta = DiskMeta {
                    expires: expires_at,
                    version: Some(V::FORMAT_VERSION),
                    size: Some(bytes.len() as u64),
                    key: Some(original_key),
                };
                disk.write(&job_digest, &bytes, &meta)
            })
            .await;

        match written {
            Ok(()) => true,
            Err(err) => {
                error!(digest = %digest, error = %err, "Error writing to disk cache");
                false
            }
        }
    }

    // == Delete ==
    /// Removes `key` from both tiers.
    ///
    /// Returns true unless the disk delete failed; deleting an absent key
    /// returns true.
    pub async fn delete(&self, key: &str) -> bool {
        let digest = digest_key(key);
        self.memory().remove(&digest);

        let disk = Arc::clone(&self.disk);
        let job_digest = digest.clone();
        match self.pool.run("delete", move || disk.delete(&job_digest)).await {
            Ok(()) => true,
            Err(err) => {
                error!(digest = %digest, error = %err, "Error deleting from disk cache");
                false
            }
        }
    }

    // == Clear ==
    /// Empties both tiers. Returns false if the disk could not be cleared.
    pub async fn clear(&self) -> bool {
        self.memory().clear();

        let disk = Arc::clone(&self.disk);
        match self.pool.run("clear", move || disk.clear()).await {
            Ok(()) => {
                info!("Cache cleared");
                true
            }
            Err(err) => {
                error!(error = %err, "Error clearing disk cache");
                false
            }
        }
    }

    // == Invalidate Pattern ==
    /// Removes every entry whose original key or digest contains `pattern`.
    ///
    /// Disk entries written without a recorded key only match on digest.
    /// A disk scan failure is logged and only memory matches are removed.
    ///
    /// # Arguments
    /// * `pattern` - Substring to look for; the empty pattern matches all
    ///
    /// # Returns
    /// The number of distinct entries removed across both tiers.
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut removed: HashSet<String> = self
            .memory()
            .remove_matching(|digest, key| pattern_matches(pattern, digest, key))
            .into_iter()
            .collect();

        let disk = Arc::clone(&self.disk);
        let job_pattern = pattern.to_string();
        let on_disk = self
            .pool
            .run("invalidate", move || {
                disk.remove_matching(|digest, key| pattern_matches(&job_pattern, digest, key))
            })
            .await;

        match on_disk {
            Ok(digests) => removed.extend(digests),
            Err(err) => error!(pattern, error = %err, "Error during pattern invalidation"),
        }

        debug!(pattern, count = removed.len(), "Invalidated entries");
        removed.len()
    }

    // == Stats ==
    /// Returns tier sizes and counters. A disk scan failure reports zero disk items.
    pub async fn get_stats(&self) -> CacheStats {
        let memory_items = self.memory().len();

        let disk = Arc::clone(&self.disk);
        let disk_items = match self.pool.run("count", move || disk.count()).await {
            Ok(count) => count,
            Err(err) => {
                error!(error = %err, "Error counting disk cache entries");
                0
            }
        };

        self.counters.snapshot(
            memory_items,
            disk_items,
            self.config.max_memory_items,
            self.config.cache_root.clone(),
        )
    }

    /// Whether `key` currently occupies a memory slot. Does not check expiry.
    pub fn contains_in_memory(&self, key: &str) -> bool {
        self.memory().contains(&digest_key(key))
    }

    fn put_memory(&self, digest: String, entry: CacheEntry<V>) {
        if let Some(evicted) = self.memory().put(digest, entry) {
            self.counters.record_eviction();
            debug!(digest = %evicted, "Evicted entry from memory tier");
        }
    }

    /// The guard is never held across an await.
    fn memory(&self) -> MutexGuard<'_, MemoryTier<V>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reads and decodes one disk entry. Runs on the I/O pool.
///
/// An entry encoded under another format version, or one that fails to
/// decode, is removed under the digest lock and reported as corrupt.
fn load_entry<V: CacheValue>(disk: &DiskTier, digest: &str) -> Result<Option<CacheEntry<V>>> {
    disk.read_with(digest, |record| {
        if let Some(version) = record.meta.version {
            if version != V::FORMAT_VERSION {
                return Err(CacheError::CorruptEntry(format!(
                    "{digest}: format version {version}, expected {}",
                    V::FORMAT_VERSION
                )));
            }
        }

        let value = V::decode(&record.bytes)?;
        Ok(CacheEntry::with_expiry(value, record.meta.expires, record.meta.key))
    })
}

fn pattern_matches(pattern: &str, digest: &str, key: Option<&str>) -> bool {
    digest.contains(pattern) || key.is_some_and(|k| k.contains(pattern))
}
