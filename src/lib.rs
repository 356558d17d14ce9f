//! Tiered Cache - A two-tier (memory + disk) key/value cache
//!
//! Values live in a bounded in-process map backed by one data file and one
//! metadata file per key on disk. Entries expire lazily on read, memory
//! eviction is ordered by expiry time, and every disk operation runs on a
//! fixed-size blocking worker pool so async callers never block on file I/O.

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheManager, CacheStats, CacheValue, Json};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
