//! Concurrent key-value cache with per-entry expiry.
//!
//! Shared by the response cache and the prompt resolver. Reads and writes go
//! through [`DashMap`] shards, so concurrent callers never serialize on a
//! single lock. Expired entries are dropped on lookup, and every
//! [`SWEEP_INTERVAL`] inserts a sweep reclaims expired entries under keys that
//! are never read again.

use dashmap::DashMap;
use serde::Serialize;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::llm::types::Message;

/// Namespace for response fingerprints
const FINGERPRINT_NAMESPACE: Uuid = Uuid::from_u128(0x6c6c_6d2d_6761_7465_7761_792d_7265_7370);

/// Inserts between two sweeps of expired entries
pub const SWEEP_INTERVAL: usize = 256;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, CacheEntry<V>>,
    inserts: AtomicUsize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            inserts: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        // Guard dropped above; removing while holding it would deadlock the shard
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.insert(key, CacheEntry { value, expires_at });

        let inserted = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if inserted % SWEEP_INTERVAL == 0 {
            self.purge_expired();
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Key of a cached generation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseKey {
    pub provider_id: String,
    pub model_id: String,
    pub fingerprint: Uuid,
}

impl ResponseKey {
    pub fn new(provider_id: &str, model_id: &str, messages: &[Message]) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            model_id: model_id.to_string(),
            fingerprint: fingerprint(messages),
        }
    }
}

/// Deterministic fingerprint of an ordered message sequence
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Uuid {
    // Serializing plain strings and enums cannot fail
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    Uuid::new_v5(&FINGERPRINT_NAMESPACE, &bytes)
}

pub type ResponseCache = TtlCache<ResponseKey, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        cache.insert("a".to_string(), 1, Duration::from_secs(60));
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"b".to_string()), None);
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache: TtlCache<&'static str, u32> = TtlCache::new();
        cache.insert("gone", 1, Duration::ZERO);
        cache.insert("kept", 2, Duration::from_secs(60));

        assert_eq!(cache.get(&"gone"), None);
        assert_eq!(cache.len(), 1);

        cache.insert("gone", 3, Duration::ZERO);
        cache.purge_expired();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"kept"), Some(2));
    }

    #[test]
    fn test_expired_entries_under_distinct_keys_are_reclaimed() {
        let cache: TtlCache<usize, usize> = TtlCache::new();
        cache.insert(usize::MAX, 0, Duration::from_secs(60));

        for key in 0..10_000 {
            cache.insert(key, key, Duration::ZERO);
        }

        // Only inserts since the last sweep can still be present
        assert!(cache.len() <= SWEEP_INTERVAL);
        assert_eq!(cache.get(&usize::MAX), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_live_entries() {
        let cache: TtlCache<usize, usize> = TtlCache::new();
        for key in 0..SWEEP_INTERVAL - 1 {
            cache.insert(key, key, Duration::from_secs(10));
        }
        tokio::time::advance(Duration::from_secs(11)).await;

        // This insert triggers the sweep, which drops everything inserted before
        cache.insert(SWEEP_INTERVAL, 0, Duration::from_secs(10));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&SWEEP_INTERVAL), Some(0));
    }

    #[test]
    fn test_fingerprint_is_order_sensitive() {
        let forward = vec![Message::system("a"), Message::user("b")];
        let reversed = vec![Message::user("b"), Message::system("a")];

        assert_eq!(fingerprint(&forward), fingerprint(&forward.clone()));
        assert_ne!(fingerprint(&forward), fingerprint(&reversed));
    }

    #[test]
    fn test_concurrent_access() {
        let cache = std::sync::Arc::new(TtlCache::<u32, u32>::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        cache.insert(j, i, Duration::from_secs(60));
                        cache.get(&j);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 100);
    }
}
