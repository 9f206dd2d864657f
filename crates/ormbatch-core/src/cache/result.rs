//! Result cache policy layer.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use super::provider::{CachePayload, CacheProvider, MemoryCacheProvider};

/// Result cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
}

impl CacheStats {
    /// Get hit count.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get miss count.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get store count.
    pub fn stores(&self) -> u64 {
        self.stores.load(Ordering::Relaxed)
    }

    /// Calculate hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

/// Memoizes materialized results per cache key.
pub struct ResultCache {
    provider: Arc<dyn CacheProvider>,
    stats: CacheStats,
}

impl ResultCache {
    /// Create a cache over a provider.
    pub fn new(provider: Arc<dyn CacheProvider>) -> Self {
        Self {
            provider,
            stats: CacheStats::default(),
        }
    }

    /// Create a cache over a fresh [`MemoryCacheProvider`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCacheProvider::new()))
    }

    /// Look up a live payload.
    pub fn get(&self, key: &str) -> Option<CachePayload> {
        let found = self.provider.get(key);
        self.record(key, found.is_some());
        found
    }

    /// Look up a live payload of type `T`. A payload of another type counts
    /// as a miss.
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let found = self
            .provider
            .get(key)
            .and_then(|payload| payload.downcast::<T>().ok());
        self.record(key, found.is_some());
        found
    }

    /// Store a payload, replacing any existing entry.
    pub fn set(&self, key: &str, payload: CachePayload, expiration: Duration) {
        self.provider.set(key, payload, expiration);
        self.stats.stores.fetch_add(1, Ordering::Relaxed);
        trace!(key, expiration_ms = expiration.as_millis() as u64, "result cache store");
    }

    /// Remove one entry.
    pub fn invalidate(&self, key: &str) -> bool {
        self.provider.remove(key)
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.provider.clear();
    }

    /// Statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn record(&self, key: &str, hit: bool) {
        if hit {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key, "result cache hit");
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key, "result cache miss");
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
