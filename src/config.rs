//! Configuration Module
//!
//! Construction parameters for a `CacheManager`, loadable from environment
//! variables.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default maximum number of entries held in the memory tier
pub const DEFAULT_MAX_MEMORY_ITEMS: usize = 1000;

/// Default TTL in seconds
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Default number of disk I/O workers
pub const DEFAULT_WORKER_POOL_SIZE: usize = 4;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory holding the `data/` and `meta/` subdirectories
    pub cache_root: PathBuf,
    /// Maximum number of entries the memory tier can hold
    pub max_memory_items: usize,
    /// Default TTL in seconds for entries set without explicit TTL
    pub default_ttl: u64,
    /// Number of concurrent disk operations
    pub worker_pool_size: usize,
}

impl CacheConfig {
    /// Creates a config rooted at `cache_root` with default limits.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            ..Self::default()
        }
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DIR` - Cache root directory (default: `.cache`)
    /// - `CACHE_MAX_MEMORY_ITEMS` - Memory tier capacity (default: 1000)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 3600)
    /// - `CACHE_WORKER_POOL_SIZE` - Disk worker count (default: 4)
    pub fn from_env() -> Self {
        Self {
            cache_root: env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".cache")),
            max_memory_items: parse_env("CACHE_MAX_MEMORY_ITEMS")
                .unwrap_or(DEFAULT_MAX_MEMORY_ITEMS),
            default_ttl: parse_env("CACHE_DEFAULT_TTL").unwrap_or(DEFAULT_TTL_SECS),
            worker_pool_size: parse_env("CACHE_WORKER_POOL_SIZE")
                .unwrap_or(DEFAULT_WORKER_POOL_SIZE),
        }
    }

    pub fn with_max_memory_items(mut self, max_memory_items: usize) -> Self {
        self.max_memory_items = max_memory_items;
        self
    }

    pub fn with_default_ttl(mut self, default_ttl: u64) -> Self {
        self.default_ttl = default_ttl;
        self
    }

    pub fn with_worker_pool_size(mut self, worker_pool_size: usize) -> Self {
        self.worker_pool_size = worker_pool_size;
        self
    }

    /// Default TTL as a `Duration`.
    pub fn default_ttl_duration(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Rejects parameters the cache cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.worker_pool_size == 0 {
            return Err(CacheError::Config(
                "worker_pool_size must be at least 1".to_string(),
            ));
        }
        if self.cache_root.as_os_str().is_empty() {
            return Err(CacheError::Config("cache_root must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from(".cache"),
            max_memory_items: DEFAULT_MAX_MEMORY_ITEMS,
            default_ttl: DEFAULT_TTL_SECS,
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
