//! Disk Tier Module
//!
//! Persists each entry as a pair of files named by its digest:
//! `<root>/data/<digest>.bin` holds the encoded value and
//! `<root>/meta/<digest>.json` holds its expiry and bookkeeping. All methods
//! here block; the `CacheManager` only ever calls them through the I/O pool.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::cache::entry::is_expired_at;
use crate::cache::{DATA_DIR, DATA_EXT, META_DIR, META_EXT};
use crate::error::{CacheError, Result};

// == Disk Meta ==
/// Contents of a metadata file. Only `expires` is required on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskMeta {
    /// Expiration timestamp (Unix epoch seconds)
    pub expires: f64,
    /// `CacheValue::FORMAT_VERSION` the data file was encoded with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Byte length of the data file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Original, unhashed cache key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// A data file together with its metadata.
#[derive(Debug, Clone)]
pub struct DiskRecord {
    pub bytes: Vec<u8>,
    pub meta: DiskMeta,
}

/// Number of lock stripes guarding same-digest file pairs
const LOCK_STRIPES: usize = 64;

// == Disk Tier ==
/// File-pair storage under a cache root.
///
/// Operations on one digest hold that digest's lock stripe, so a reader
/// never observes a pair halfway through a write and never discards a pair
/// another thread just wrote. Different digests proceed in parallel unless
/// they share a stripe.
#[derive(Debug)]
pub struct DiskTier {
    data_dir: PathBuf,
    meta_dir: PathBuf,
    locks: Vec<Mutex<()>>,
}

impl DiskTier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            data_dir: root.join(DATA_DIR),
            meta_dir: root.join(META_DIR),
            locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Creates the `data/` and `meta/` directories if missing.
    pub fn init(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.meta_dir] {
            fs::create_dir_all(dir).map_err(|e| CacheError::write(dir, e))?;
        }
        Ok(())
    }

    pub fn data_path(&self, digest: &str) -> PathBuf {
        self.data_dir.join(format!("{digest}.{DATA_EXT}"))
    }

    pub fn meta_path(&self, digest: &str) -> PathBuf {
        self.meta_dir.join(format!("{digest}.{META_EXT}"))
    }

    fn lock(&self, digest: &str) -> MutexGuard<'_, ()> {
        let stripe = digest
            .bytes()
            .fold(0usize, |h, b| h.wrapping_mul(31).wrapping_add(usize::from(b)))
            % self.locks.len();
        self.locks[stripe].lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Write ==
    /// Stores `bytes` and `meta` under `digest`.
    ///
    /// Each file is written to a temporary sibling and renamed into place,
    /// data first and metadata last, so a crash never leaves a metadata file
    /// pointing at a partially written value.
    ///
    /// # Arguments
    /// * `digest` - Storage identifier, used as the file stem
    /// * `bytes` - Encoded value for the data file
    /// * `meta` - Contents of the metadata file
    pub fn write(&self, digest: &str, bytes: &[u8], meta: &DiskMeta) -> Result<()> {
        let json = serde_json::to_vec(meta)?;

        let _guard = self.lock(digest);
        replace_file(&self.data_path(digest), bytes)?;
        replace_file(&self.meta_path(digest), &json)
    }

    // == Read ==
    /// Loads the pair stored under `digest`.
    ///
    /// Returns `Ok(None)` when either file is missing or the entry has
    /// expired; in both cases whatever is left of the pair is removed.
    /// Unparsable metadata or a size mismatch removes the pair and yields
    /// `CorruptEntry`.
    pub fn read(&self, digest: &str) -> Result<Option<DiskRecord>> {
        self.read_with(digest, Ok)
    }

    /// Loads the pair under `digest` and hands it to `accept` while still
    /// holding the digest's lock.
    ///
    /// If `accept` rejects the record with `CorruptEntry` or `Serialization`,
    /// the pair is removed before the lock is released, so a concurrent
    /// writer's newer pair is never the one discarded.
    ///
    /// # Returns
    /// - `Ok(Some(value))` for a live entry `accept` took
    /// - `Ok(None)` for a missing, orphaned or expired entry
    /// - `Err(_)` for read failures, corruption, or a rejected record
    pub fn read_with<T, F>(&self, digest: &str, accept: F) -> Result<Option<T>>
    where
        F: FnOnce(DiskRecord) -> Result<T>,
    {
        let _guard = self.lock(digest);

        let Some(record) = self.read_unlocked(digest)? else {
            return Ok(None);
        };

        match accept(record) {
            Ok(value) => Ok(Some(value)),
            Err(err @ (CacheError::CorruptEntry(_) | CacheError::Serialization(_))) => {
                self.discard_unlocked(digest);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn read_unlocked(&self, digest: &str) -> Result<Option<DiskRecord>> {
        let meta = match self.read_meta(digest) {
            Ok(Some(meta)) => meta,
            Ok(None) => {
                // Clears a data file left without its metadata
                self.discard_unlocked(digest);
                return Ok(None);
            }
            Err(err @ CacheError::CorruptEntry(_)) => {
                self.discard_unlocked(digest);
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        if is_expired_at(meta.expires) {
            debug!(digest, "Disk entry expired");
            self.discard_unlocked(digest);
            return Ok(None);
        }

        let data_path = self.data_path(digest);
        let bytes = match fs::read(&data_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(digest, "Removing metadata left without its data file");
                self.discard_unlocked(digest);
                return Ok(None);
            }
            Err(e) => return Err(CacheError::read(&data_path, e)),
        };

        if let Some(size) = meta.size {
            if size != bytes.len() as u64 {
                self.discard_unlocked(digest);
                return Err(CacheError::CorruptEntry(format!(
                    "{digest}: metadata records {size} bytes, data file has {}",
                    bytes.len()
                )));
            }
        }

        Ok(Some(DiskRecord { bytes, meta }))
    }

    /// Parses the metadata file. `Ok(None)` if it does not exist.
    pub fn read_meta(&self, digest: &str) -> Result<Option<DiskMeta>> {
        let meta_path = self.meta_path(digest);
        let raw = match fs::read(&meta_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::read(&meta_path, e)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| CacheError::CorruptEntry(format!("{digest}: bad metadata: {e}")))
    }

    // == Delete ==
    /// Removes both files. A missing file is not an error.
    pub fn delete(&self, digest: &str) -> Result<()> {
        let _guard = self.lock(digest);
        self.delete_unlocked(digest)
    }

    fn delete_unlocked(&self, digest: &str) -> Result<()> {
        remove_if_present(&self.data_path(digest))?;
        remove_if_present(&self.meta_path(digest))?;
        Ok(())
    }

    /// Best-effort delete; failures are only logged.
    fn discard_unlocked(&self, digest: &str) {
        if let Err(err) = self.delete_unlocked(digest) {
            debug!(digest, error = %err, "Failed to discard disk entry");
        }
    }

    // == Clear ==
    /// Removes every data and metadata file under the root.
    ///
    /// Holds every lock stripe, so no write lands halfway through.
    pub fn clear(&self) -> Result<()> {
        let _guards: Vec<MutexGuard<'_, ()>> = self
            .locks
            .iter()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner))
            .collect();

        for (dir, ext) in [(&self.data_dir, DATA_EXT), (&self.meta_dir, META_EXT)] {
            for path in list_with_extension(dir, ext)? {
                remove_if_present(&path)?;
            }
        }
        Ok(())
    }

    // == Scan Keys ==
    /// Lists the digests of all stored data files.
    pub fn scan_keys(&self) -> Result<Vec<String>> {
        Ok(list_with_extension(&self.data_dir, DATA_EXT)?
            .iter()
            .filter_map(|path| path.file_stem()?.to_str().map(str::to_string))
            .collect())
    }

    pub fn count(&self) -> Result<usize> {
        Ok(list_with_extension(&self.data_dir, DATA_EXT)?.len())
    }

    /// Deletes every stored entry accepted by `matches(digest, original_key)`.
    ///
    /// Entries whose metadata is missing or unreadable are matched with no
    /// key. A failed delete is logged and skipped. Returns the digests removed.
    pub fn remove_matching<F>(&self, matches: F) -> Result<Vec<String>>
    where
        F: Fn(&str, Option<&str>) -> bool,
    {
        let mut removed = Vec::new();
        for digest in self.scan_keys()? {
            let key = self.read_meta(&digest).ok().flatten().and_then(|m| m.key);
            if !matches(&digest, key.as_deref()) {
                continue;
            }
            match self.delete(&digest) {
                Ok(()) => removed.push(digest),
                Err(err) => error!(digest = %digest, error = %err, "Failed to invalidate disk entry"),
            }
        }
        Ok(removed)
    }
}

/// Writes `contents` to a `.tmp` sibling of `path`, then renames it over `path`.
///
/// The caller holds the digest lock, so the temporary name is not shared.
fn replace_file(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    if let Err(e) = fs::write(&tmp_path, contents) {
        let _ = fs::remove_file(&tmp_path);
        return Err(CacheError::write(&tmp_path, e));
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(CacheError::write(path, e));
    }
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::write(path, e)),
    }
}

/// Files directly under `dir` with extension `ext`. A missing directory is empty.
fn list_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CacheError::read(dir, e)),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CacheError::read(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == ext) {
            paths.push(path);
        }
    }
    Ok(paths)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::now_epoch_secs;
    use tempfile::TempDir;

    fn open_tier() -> (TempDir, DiskTier) {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::new(tmp.path());
        tier.init().unwrap();
        (tmp, tier)
    }

    fn meta_in(secs: f64, bytes: &[u8]) -> DiskMeta {
        DiskMeta {
            expires: now_epoch_secs() + secs,
            version: Some(1),
            size: Some(bytes.len() as u64),
            key: Some("key".to_string()),
        }
    }

    #[test]
    fn test_write_creates_file_pair() {
        let (_tmp, tier) = open_tier();

        tier.write("abc", b"payload", &meta_in(60.0, b"payload")).unwrap();

        assert!(tier.data_path("abc").is_file());
        assert!(tier.meta_path("abc").is_file());
        assert_eq!(fs::read(tier.data_path("abc")).unwrap(), b"payload");

        let meta: serde_json::Value =
            serde_json::from_slice(&fs::read(tier.meta_path("abc")).unwrap()).unwrap();
        assert!(meta["expires"].is_f64());
    }

    #[test]
    fn test_read_returns_record() {
        let (_tmp, tier) = open_tier();
        let meta = meta_in(60.0, b"payload");

        tier.write("abc", b"payload", &meta).unwrap();
        let record = tier.read("abc").unwrap().unwrap();

        assert_eq!(record.bytes, b"payload");
        assert_eq!(record.meta, meta);
    }

    #[test]
    fn test_read_missing() {
        let (_tmp, tier) = open_tier();
        assert!(tier.read("nope").unwrap().is_none());
    }

    #[test]
    fn test_read_expired_removes_files() {
        let (_tmp, tier) = open_tier();

        tier.write("abc", b"payload", &meta_in(-1.0, b"payload")).unwrap();

        assert!(tier.read("abc").unwrap().is_none());
        assert!(!tier.data_path("abc").exists());
        assert!(!tier.meta_path("abc").exists());
    }

    #[test]
    fn test_read_orphaned_data_file_is_removed() {
        let (_tmp, tier) = open_tier();

        tier.write("abc", b"payload", &meta_in(60.0, b"payload")).unwrap();
        fs::remove_file(tier.meta_path("abc")).unwrap();

        assert!(tier.read("abc").unwrap().is_none());
        assert!(!tier.data_path("abc").exists());
    }

    #[test]
    fn test_read_orphaned_meta_file_is_removed() {
        let (_tmp, tier) = open_tier();

        tier.write("abc", b"payload", &meta_in(60.0, b"payload")).unwrap();
        fs::remove_file(tier.data_path("abc")).unwrap();

        assert!(tier.read("abc").unwrap().is_none());
        assert!(!tier.meta_path("abc").exists());
    }

    #[test]
    fn test_rejected_record_is_removed() {
        let (_tmp, tier) = open_tier();

        tier.write("abc", b"payload", &meta_in(60.0, b"payload")).unwrap();

        let result: Result<Option<()>> = tier.read_with("abc", |_| {
            Err(CacheError::CorruptEntry("unwanted".to_string()))
        });
        assert!(matches!(result, Err(CacheError::CorruptEntry(_))));
        assert!(!tier.data_path("abc").exists());
        assert!(!tier.meta_path("abc").exists());
    }

    #[test]
    fn test_other_rejection_keeps_files() {
        let (_tmp, tier) = open_tier();

        tier.write("abc", b"payload", &meta_in(60.0, b"payload")).unwrap();

        let result: Result<Option<()>> = tier.read_with("abc", |_| {
            Err(CacheError::WorkerPool("interrupted".to_string()))
        });
        assert!(matches!(result, Err(CacheError::WorkerPool(_))));
        assert!(tier.data_path("abc").is_file());
        assert!(tier.meta_path("abc").is_file());
    }

    #[test]
    fn test_rewrite_leaves_no_temp_files() {
        let (tmp, tier) = open_tier();

        tier.write("abc", b"first", &meta_in(60.0, b"first")).unwrap();
        tier.write("abc", b"second!", &meta_in(60.0, b"second!")).unwrap();

        let record = tier.read("abc").unwrap().unwrap();
        assert_eq!(record.bytes, b"second!");
        for dir in [DATA_DIR, META_DIR] {
            let names: Vec<_> = fs::read_dir(tmp.path().join(dir))
                .unwrap()
                .map(|entry| entry.unwrap().file_name())
                .collect();
            assert_eq!(names.len(), 1, "unexpected files in {dir}: {names:?}");
        }
    }

    #[test]
    fn test_read_legacy_meta_with_only_expires() {
        let (_tmp, tier) = open_tier();

        fs::write(tier.data_path("abc"), b"old").unwrap();
        fs::write(
            tier.meta_path("abc"),
            format!("{{\"expires\": {}}}", now_epoch_secs() + 60.0),
        )
        .unwrap();

        let record = tier.read("abc").unwrap().unwrap();
        assert_eq!(record.bytes, b"old");
        assert_eq!(record.meta.version, None);
        assert_eq!(record.meta.key, None);
    }

    #[test]
    fn test_read_garbage_meta_is_corrupt() {
        let (_tmp, tier) = open_tier();

        fs::write(tier.data_path("abc"), b"payload").unwrap();
        fs::write(tier.meta_path("abc"), b"not json").unwrap();

        assert!(matches!(tier.read("abc"), Err(CacheError::CorruptEntry(_))));
        assert!(!tier.data_path("abc").exists());
        assert!(!tier.meta_path("abc").exists());
    }

    #[test]
    fn test_read_size_mismatch_is_corrupt() {
        let (_tmp, tier) = open_tier();

        tier.write("abc", b"payload", &meta_in(60.0, b"payload")).unwrap();
        fs::write(tier.data_path("abc"), b"truncated?").unwrap();

        assert!(matches!(tier.read("abc"), Err(CacheError::CorruptEntry(_))));
    }

    #[test]
    fn test_concurrent_rewrites_never_tear_a_pair() {
        let (_tmp, tier) = open_tier();
        let tier = std::sync::Arc::new(tier);

        let writers: Vec<_> = (1..=8usize)
            .map(|len| {
                let tier = std::sync::Arc::clone(&tier);
                std::thread::spawn(move || {
                    let bytes = vec![b'x'; len * 3];
                    for _ in 0..50 {
                        tier.write("k", &bytes, &meta_in(60.0, &bytes)).unwrap();
                    }
                })
            })
            .collect();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let tier = std::sync::Arc::clone(&tier);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        // A torn pair would surface as a size mismatch
                        assert!(tier.read("k").is_ok());
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }
        assert!(tier.read("k").unwrap().is_some());
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let (_tmp, tier) = open_tier();
        assert!(tier.delete("nope").is_ok());
    }

    #[test]
    fn test_scan_clear_and_count() {
        let (tmp, tier) = open_tier();

        tier.write("one", b"1", &meta_in(60.0, b"1")).unwrap();
        tier.write("two", b"2", &meta_in(60.0, b"2")).unwrap();
        fs::write(tmp.path().join(DATA_DIR).join("stray.txt"), b"x").unwrap();

        let mut keys = tier.scan_keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["one".to_string(), "two".to_string()]);
        assert_eq!(tier.count().unwrap(), 2);

        tier.clear().unwrap();
        assert_eq!(tier.count().unwrap(), 0);
        assert!(!tier.meta_path("one").exists());
        // Files that are not cache entries are left alone
        assert!(tmp.path().join(DATA_DIR).join("stray.txt").exists());
    }

    #[test]
    fn test_remove_matching_uses_stored_key() {
        let (_tmp, tier) = open_tier();

        let mut meta = meta_in(60.0, b"1");
        meta.key = Some("component:button".to_string());
        tier.write("d1", b"1", &meta).unwrap();
        meta.key = Some("schema:user".to_string());
        tier.write("d2", b"1", &meta).unwrap();

        let removed = tier
            .remove_matching(|_, key| key.is_some_and(|k| k.contains("component")))
            .unwrap();

        assert_eq!(removed, vec!["d1".to_string()]);
        assert_eq!(tier.scan_keys().unwrap(), vec!["d2".to_string()]);
    }
}
