//! Response cache
//!
//! Successful responses keyed by a SHA-256 digest of the prompt pair.
//! Entries expire after a TTL; when full, the oldest entry is evicted.

use crate::selector::PromptPayload;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default entry lifetime
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);
/// Default capacity
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
struct CacheEntry {
    text: String,
    backend: String,
    tokens_used: u64,
    inserted_at: Instant,
}

/// Cached response
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    /// Generated text
    pub text: String,
    /// Backend that produced it
    pub backend: String,
    /// Tokens the original call consumed
    pub tokens_used: u64,
}

/// TTL-bounded response cache
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL, DEFAULT_CACHE_CAPACITY)
    }
}

impl ResponseCache {
    /// Create a cache
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cache key for a payload
    #[must_use]
    pub fn key_for(payload: &PromptPayload) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload.system_prompt.as_deref().unwrap_or_default().as_bytes());
        hasher.update(b"|");
        hasher.update(payload.prompt.as_bytes());
        if let Some(model) = payload.model_override.as_deref() {
            hasher.update(b"|");
            hasher.update(model.as_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// Look up a live entry; expired entries are dropped
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            entries.remove(key);
            return None;
        }
        debug!(backend = %entry.backend, "Response cache hit");
        Some(CachedResponse {
            text: entry.text.clone(),
            backend: entry.backend.clone(),
            tokens_used: entry.tokens_used,
        })
    }

    /// Store a successful response
    pub fn insert(&self, key: String, response: CachedResponse) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            CacheEntry {
                text: response.text,
                backend: response.backend,
                tokens_used: response.tokens_used,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Number of stored entries, expired ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(text: &str) -> CachedResponse {
        CachedResponse {
            text: text.to_string(),
            backend: "alpha".to_string(),
            tokens_used: 12,
        }
    }

    #[test]
    fn test_key_depends_on_both_prompts() {
        let a = ResponseCache::key_for(&PromptPayload::new("hello"));
        let b = ResponseCache::key_for(&PromptPayload::new("hello").with_system_prompt("sys"));
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(a, ResponseCache::key_for(&PromptPayload::new("hello")));
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = ResponseCache::default();
        assert!(cache.get("k").is_none());
        cache.insert("k".to_string(), response("text"));
        assert_eq!(cache.get("k").unwrap().text, "text");
    }

    #[test]
    fn test_expired_entry_dropped() {
        let cache = ResponseCache::new(Duration::from_millis(10), 10);
        cache.insert("k".to_string(), response("text"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_oldest_evicted_at_capacity() {
        let cache = ResponseCache::new(DEFAULT_CACHE_TTL, 2);
        cache.insert("first".to_string(), response("1"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("second".to_string(), response("2"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("third".to_string(), response("3"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("first").is_none());
        assert!(cache.get("third").is_some());
    }
}
