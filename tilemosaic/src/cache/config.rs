//! Configuration for the read cache.

use std::time::Duration;

/// Default time-to-live for cached reads.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default approximate cap on cached bytes (512 MB).
pub const DEFAULT_CACHE_MAX_SIZE: u64 = 512 * 1024 * 1024;

/// Cache behaviour, passed explicitly to every backend handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// When false every read goes to the backend and nothing is retained
    pub enabled: bool,
    /// Entries expire this long after insertion
    pub ttl: Duration,
    /// Approximate upper bound on the total weight of cached entries
    pub max_size_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: DEFAULT_CACHE_TTL,
            max_size_bytes: DEFAULT_CACHE_MAX_SIZE,
        }
    }
}

impl CacheConfig {
    pub fn new(ttl: Duration, max_size_bytes: u64) -> Self {
        Self {
            enabled: true,
            ttl,
            max_size_bytes,
        }
    }

    /// A configuration that caches nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ttl: Duration::ZERO,
            max_size_bytes: 0,
        }
    }

    /// True when reads can actually be retained.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.ttl.is_zero() && self.max_size_bytes > 0
    }
}
