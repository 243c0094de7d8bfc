//! Bounded, time-expiring cache of hosts that reject shallow clones

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(50).unwrap();
const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Remembers hosts whose git servers rejected a `--depth 1` clone.
///
/// Once a host is marked, the clone strategy skips the shallow attempt for
/// subsequent clones from that host and goes straight to full depth. Entries
/// expire after a few minutes and the cache holds at most a few dozen hosts,
/// so the penalty is bounded in both time and space.
pub struct NoShallowCache {
    entries: Mutex<LruCache<String, Instant>>,
    ttl: Duration,
}

impl Default for NoShallowCache {
    fn default() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl NoShallowCache {
    /// Creates a cache with the default capacity and expiry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache with explicit bounds. Used by tests to exercise
    /// expiry and eviction without waiting on the production values.
    #[must_use]
    pub fn with_capacity_and_ttl(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Whether `host` is currently flagged as rejecting shallow clones.
    ///
    /// Expired entries are removed on lookup.
    pub fn is_no_shallow(&self, host: &str) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(host) {
            Some(marked_at) if marked_at.elapsed() < self.ttl => true,
            Some(_) => {
                entries.pop(host);
                false
            }
            None => false,
        }
    }

    /// Flags `host` as rejecting shallow clones.
    pub fn mark_no_shallow(&self, host: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.put(host.to_string(), Instant::now());
        tracing::debug!(target: "git", "marked host as no-shallow: {host}");
    }
}
