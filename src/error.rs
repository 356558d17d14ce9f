//! Error types for the tiered cache
//!
//! Provides unified error handling using thiserror. None of these escape the
//! public `CacheManager` operations: they are logged at the tier boundary and
//! turned into misses or `false` results.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the tiered cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Writing a data or metadata file failed
    #[error("Disk write failed for {path}: {source}")]
    DiskWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading a data or metadata file failed
    #[error("Disk read failed for {path}: {source}")]
    DiskRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Data and metadata files disagree, or metadata is unreadable
    #[error("Corrupt entry: {0}")]
    CorruptEntry(String),

    /// Encoding or decoding a value failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid construction parameters
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A dispatched disk job panicked or the pool shut down
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

impl CacheError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CacheError::DiskWrite {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CacheError::DiskRead {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the tiered cache.
pub type Result<T> = std::result::Result<T, CacheError>;
