use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::RwLock;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::store::{CacheError, CacheStore};
use crate::config::CacheConfig;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Vec<u8>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|duration| {
            Utc::now() + chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
        });

        Self { data, expires_at }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() > expires_at,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub evictions: u64,
    pub current_size: usize,
    pub max_size: usize,
    pub hit_rate: f64,
    pub total_requests: u64,
}

impl CacheStats {
    pub fn new(max_size: usize) -> Self {
        Self {
            hits: 0,
            misses: 0,
            writes: 0,
            evictions: 0,
            current_size: 0,
            max_size,
            hit_rate: 0.0,
            total_requests: 0,
        }
    }

    fn record_hit(&mut self) {
        self.hits += 1;
        self.total_requests += 1;
        self.update_hit_rate();
    }

    fn record_miss(&mut self) {
        self.misses += 1;
        self.total_requests += 1;
        self.update_hit_rate();
    }

    fn update_hit_rate(&mut self) {
        if self.total_requests > 0 {
            self.hit_rate = self.hits as f64 / self.total_requests as f64;
        }
    }
}

/// Process-local LRU store. Entries carry their own expiry; expired entries
/// are dropped on read and swept periodically.
#[derive(Clone)]
pub struct MemoryCacheStore {
    cache: Arc<RwLock<LruCache<String, CacheEntry>>>,
    stats: Arc<RwLock<CacheStats>>,
    enable_stats: bool,
    max_size: usize,
    last_cleanup: Arc<RwLock<Instant>>,
}

impl MemoryCacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_size).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: Arc::new(RwLock::new(LruCache::new(capacity))),
            stats: Arc::new(RwLock::new(CacheStats::new(config.max_size))),
            enable_stats: config.enable_stats,
            max_size: config.max_size,
            last_cleanup: Arc::new(RwLock::new(Instant::now())),
        }
    }

    // The cache lock is always released before the stats lock is taken.
    pub fn get_entry(&self, key: &str) -> Option<Vec<u8>> {
        self.cleanup_expired_if_needed();

        let hit = {
            let mut cache = self.cache.write();
            match cache.get(key).map(|entry| (entry.is_expired(), entry.data.clone())) {
                Some((true, _)) => {
                    debug!("Cache entry expired for key: {}", key);
                    cache.pop(key);
                    None
                }
                Some((false, data)) => Some(data),
                None => None,
            }
        };

        if self.enable_stats {
            let mut stats = self.stats.write();
            if hit.is_some() {
                stats.record_hit();
            } else {
                stats.record_miss();
            }
        }

        hit
    }

    pub fn put_entry(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        let (displaced, size) = {
            let mut cache = self.cache.write();
            let displaced = cache.push(key.to_string(), CacheEntry::new(value, ttl));
            (displaced, cache.len())
        };

        if self.enable_stats {
            let mut stats = self.stats.write();
            stats.writes += 1;
            if matches!(displaced, Some((ref old_key, _)) if old_key != key) {
                stats.evictions += 1;
            }
            stats.current_size = size;
        }

        debug!("Cached value for key: {} (TTL: {:?})", key, ttl);
    }

    pub fn remove(&self, key: &str) -> bool {
        let (removed, size) = {
            let mut cache = self.cache.write();
            let removed = cache.pop(key).is_some();
            (removed, cache.len())
        };

        if self.enable_stats {
            self.stats.write().current_size = size;
        }

        removed
    }

    pub fn stats(&self) -> CacheStats {
        if self.enable_stats {
            let size = self.cache.read().len();
            let mut stats = self.stats.write();
            stats.current_size = size;
            stats.clone()
        } else {
            CacheStats::new(self.max_size)
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.cache.read().contains(key)
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    fn cleanup_expired_if_needed(&self) {
        let now = Instant::now();
        let mut last_cleanup = self.last_cleanup.write();

        if now.duration_since(*last_cleanup) > CLEANUP_INTERVAL {
            *last_cleanup = now;
            drop(last_cleanup);
            self.cleanup_expired();
        }
    }

    fn cleanup_expired(&self) {
        let mut cache = self.cache.write();
        let expired: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            cache.pop(key);
        }

        debug!("Cleaned up {} expired cache entries", expired.len());
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.get_entry(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.put_entry(key, value, ttl);
        Ok(())
    }
}
