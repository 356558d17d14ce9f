//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// A value plus its absolute expiry, held independently by each tier.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Expiration timestamp (Unix epoch seconds)
    pub expires_at: f64,
    /// The original, unhashed key, when known
    pub key: Option<String>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry that expires `ttl` from now.
    pub fn new(value: V, ttl: Duration, key: Option<String>) -> Self {
        Self {
            value,
            expires_at: expires_after(ttl),
            key,
        }
    }

    /// Creates an entry with an already computed expiry.
    pub fn with_expiry(value: V, expires_at: f64, key: Option<String>) -> Self {
        Self {
            value,
            expires_at,
            key,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is greater than or equal to
    /// its expiration time, so a zero TTL is expired immediately.
    pub fn is_expired(&self) -> bool {
        is_expired_at(self.expires_at)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in fractional seconds.
pub fn now_epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
}

/// Absolute expiry `ttl` from now.
fn expires_after(ttl: Duration) -> f64 {
    now_epoch_secs() + ttl.as_secs_f64()
}

pub fn is_expired_at(expires_at: f64) -> bool {
    now_epoch_secs() >= expires_at
}
