//! Cache Module
//!
//! Two-tier caching: a bounded memory tier with expiry-ordered eviction in
//! front of a persistent disk tier, composed by `CacheManager`.

mod codec;
mod digest;
mod disk;
mod entry;
mod expiry;
mod manager;
mod memory;
mod pool;
mod stats;


// Re-export public types
pub use codec::{CacheValue, Json};
pub use digest::{digest_key, DIGEST_LEN};
pub use disk::{DiskMeta, DiskRecord, DiskTier};
pub use entry::CacheEntry;
pub use expiry::{ExpiryIndex, ExpirySlot};
pub use manager::CacheManager;
pub use memory::MemoryTier;
pub use pool::IoPool;
pub use stats::{CacheCounters, CacheStats};

// == Public Constants ==
/// Subdirectory of the cache root holding encoded values
pub const DATA_DIR: &str = "data";

/// Subdirectory of the cache root holding metadata files
pub const META_DIR: &str = "meta";

/// Extension of data files
pub const DATA_EXT: &str = "bin";

/// Extension of metadata files
pub const META_EXT: &str = "json";
