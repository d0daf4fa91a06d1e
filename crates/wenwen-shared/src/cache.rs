//! LRU cache with per-entry time-to-live.
//!
//! Owned by whoever constructs it and passed in explicitly; there is no
//! process-wide instance.

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

pub struct TtlCache<K: Hash + Eq, V: Clone> {
    inner: Mutex<LruCache<K, Entry<V>>>,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Fresh value for `key`; expired entries are dropped on the way out
    pub fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = match cache.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            cache.pop(key);
        }
        None
    }

    pub fn insert(&self, key: K, value: V) {
        let mut cache = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        cache.put(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Cached value, or compute, store and return it. Errors are not cached.
    pub fn get_or_try_insert_with<E, F>(&self, key: K, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = load()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn invalidate(&self, key: &K) {
        let mut cache = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        cache.pop(key);
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(ttl: Duration) -> TtlCache<&'static str, u32> {
        TtlCache::new(NonZeroUsize::new(2).unwrap(), ttl)
    }

    #[test]
    fn test_hit_and_miss() {
        let c = cache(Duration::from_secs(60));
        assert_eq!(c.get(&"a"), None);
        c.insert("a", 1);
        assert_eq!(c.get(&"a"), Some(1));
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let c = cache(Duration::ZERO);
        c.insert("a", 1);
        assert_eq!(c.get(&"a"), None);
        assert!(c.inner.lock().unwrap().is_empty());
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let c = cache(Duration::from_secs(60));
        c.insert("a", 1);
        c.insert("b", 2);
        c.get(&"a");
        c.insert("c", 3);
        assert_eq!(c.get(&"b"), None);
        assert_eq!(c.get(&"a"), Some(1));
        assert_eq!(c.get(&"c"), Some(3));
    }

    #[test]
    fn test_loader_runs_once_and_errors_are_not_cached() {
        let c = cache(Duration::from_secs(60));
        let failed: Result<u32, &str> = c.get_or_try_insert_with("a", || Err("db down"));
        assert!(failed.is_err());
        assert_eq!(c.get(&"a"), None);

        let mut calls = 0;
        for _ in 0..3 {
            let v: Result<u32, &str> = c.get_or_try_insert_with("a", || {
                calls += 1;
                Ok(7)
            });
            assert_eq!(v, Ok(7));
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_invalidate() {
        let c = cache(Duration::from_secs(60));
        c.insert("a", 1);
        c.insert("b", 2);
        c.invalidate(&"a");
        assert_eq!(c.get(&"a"), None);
        assert_eq!(c.get(&"b"), Some(2));
    }
}
