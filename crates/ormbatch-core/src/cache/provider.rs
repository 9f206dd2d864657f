//! Cache provider collaborator and its in-memory implementation.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Opaque cached value.
pub type CachePayload = Arc<dyn Any + Send + Sync>;

/// Key/value storage with per-entry expiration.
pub trait CacheProvider: Send + Sync {
    /// Fetch a live entry. Expired entries are reported as absent.
    fn get(&self, key: &str) -> Option<CachePayload>;

    /// Store an entry, replacing any existing one.
    fn set(&self, key: &str, payload: CachePayload, expiration: Duration);

    /// Remove an entry.
    fn remove(&self, key: &str) -> bool;

    /// Remove every entry.
    fn clear(&self);
}

/// A cached payload with its lifetime.
#[derive(Clone)]
pub struct CacheEntry {
    pub payload: CachePayload,
    pub created_at: Instant,
    /// `None` when the expiration is too large to represent.
    pub expires_at: Option<Instant>,
}

impl CacheEntry {
    /// Create an entry expiring `expiration` from now.
    pub fn new(payload: CachePayload, expiration: Duration) -> Self {
        let now = Instant::now();
        Self {
            payload,
            created_at: now,
            expires_at: now.checked_add(expiration),
        }
    }

    /// Whether the entry is expired at `now`. A zero expiration is expired
    /// immediately.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// In-process cache provider.
///
/// There is no background sweeper; an expired entry is evicted by the
/// lookup that finds it.
#[derive(Debug, Default)]
pub struct MemoryCacheProvider {
    entries: DashMap<String, CacheEntry>,
    evictions: AtomicU64,
}

impl MemoryCacheProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of expired entries evicted on lookup.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

impl CacheProvider for MemoryCacheProvider {
    fn get(&self, key: &str) -> Option<CachePayload> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired(now) => return Some(Arc::clone(&entry.payload)),
            Some(_) => {}
        }

        // Only evict if no fresher entry was stored in the meantime.
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        None
    }

    fn set(&self, key: &str, payload: CachePayload, expiration: Duration) {
        self.entries
            .insert(key.to_string(), CacheEntry::new(payload, expiration));
    }

    fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn payload(v: i32) -> CachePayload {
        Arc::new(v)
    }

    #[test]
    fn test_set_then_get() {
        let cache = MemoryCacheProvider::new();
        cache.set("k", payload(5), Duration::from_secs(60));

        let found = cache.get("k").unwrap();
        assert_eq!(found.downcast_ref::<i32>(), Some(&5));
        assert!(cache.get("other").is_none());
    }

    #[test]
    fn test_set_overwrites() {
        let cache = MemoryCacheProvider::new();
        cache.set("k", payload(1), Duration::from_secs(60));
        cache.set("k", payload(2), Duration::from_secs(60));
        assert_eq!(cache.get("k").unwrap().downcast_ref::<i32>(), Some(&2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_evicted_on_lookup() {
        let cache = MemoryCacheProvider::new();
        cache.set("short", payload(1), Duration::from_millis(20));
        cache.set("zero", payload(2), Duration::ZERO);

        assert!(cache.get("zero").is_none());
        assert!(cache.get("short").is_some());

        thread::sleep(Duration::from_millis(40));
        assert!(cache.get("short").is_none());
        assert_eq!(cache.evictions(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = MemoryCacheProvider::new();
        cache.set("a", payload(1), Duration::from_secs(60));
        cache.set("b", payload(2), Duration::from_secs(60));

        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        cache.clear();
        assert!(cache.get("b").is_none());
    }
}
