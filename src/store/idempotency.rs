//! Idempotency store collaborator.

use crate::endpoint::Endpoint;
use crate::Result;
use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Previously computed provider responses, keyed by idempotency key.
#[async_trait]
pub trait IdempotencyStore: Send + Sync + std::fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn put(&self, key: &str, response: Value) -> Result<()>;
}

/// Store key for one provider call: the caller's key scoped to endpoint and tool round,
/// so a follow-up round never replays the first round's response.
pub fn scoped_key(key: &str, endpoint: Endpoint, round: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(endpoint.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(round.to_be_bytes());
    hasher.update(b"\0");
    hasher.update(key.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

struct Entry {
    response: Value,
    stored_at: Instant,
}

/// LRU-bounded in-memory store with TTL expiry.
pub struct MemoryIdempotencyStore {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl MemoryIdempotencyStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryIdempotencyStore {
    fn default() -> Self {
        Self::new(1024, Duration::from_secs(86_400))
    }
}

impl std::fmt::Debug for MemoryIdempotencyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIdempotencyStore")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() <= self.ttl => {
                return Ok(Some(entry.response.clone()))
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn put(&self, key: &str, response: Value) -> Result<()> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).put(
            key.to_string(),
            Entry {
                response,
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scoped_keys_differ_per_round_and_endpoint() {
        let a = scoped_key("k", Endpoint::ResponseApi, 0);
        assert_eq!(a.len(), 64);
        assert_eq!(a, scoped_key("k", Endpoint::ResponseApi, 0));
        assert_ne!(a, scoped_key("k", Endpoint::ResponseApi, 1));
        assert_ne!(a, scoped_key("k", Endpoint::ChatCompletion, 0));
    }

    #[tokio::test]
    async fn evicts_lru_and_expires() {
        let store = MemoryIdempotencyStore::new(2, Duration::from_secs(60));
        store.put("a", json!(1)).await.unwrap();
        store.put("b", json!(2)).await.unwrap();
        store.put("c", json!(3)).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.get("c").await.unwrap(), Some(json!(3)));

        let short = MemoryIdempotencyStore::new(4, Duration::from_millis(0));
        short.put("x", json!("v")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(short.get("x").await.unwrap(), None);
        assert!(short.is_empty());
    }
}
