//! In-process TTL cache
//!
//! Expired entries are skipped on read and dropped by
//! [`Cache::purge_expired`]. Expiry uses the tokio clock so tests can
//! advance it deterministically. A TTL past the clock's range never expires.

use async_trait::async_trait;
use meridian_domain::{Cache, CacheMetadata, CachedValue, Payload};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    /// `None` when the TTL overflows the clock
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Bundled [`Cache`] implementation backed by a hash map
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet purged
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<CachedValue> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    async fn set(&self, key: &str, value: Payload, ttl_secs: u64, metadata: CacheMetadata) {
        if ttl_secs == 0 {
            return;
        }

        let entry = CacheEntry {
            value: CachedValue { value, metadata },
            expires_at: Instant::now().checked_add(Duration::from_secs(ttl_secs)),
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }

    async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !matches_pattern(pattern, key));
        let removed = before - entries.len();
        tracing::debug!("Invalidated {} cache entries matching '{}'", removed, pattern);
        removed
    }

    async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }
}

/// Glob match where `*` stands for any run of characters
pub fn matches_pattern(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !key.starts_with(first) || key.len() < first.len() + last.len() || !key.ends_with(last) {
        return false;
    }

    let mut rest = &key[first.len()..key.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(index) => rest = &rest[index + part.len()..],
            None => return false,
        }
    }
    true
}
