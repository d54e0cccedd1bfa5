//! Time-bounded memoization of successful API responses.
//!
//! - Keys are a pure function of operation name + arguments ([`cache_key`])
//! - Entries expire per their own TTL; expired entries are purged lazily on insert
//! - Only successful responses are stored
//! - The store sits behind [`ResponseCache`] so it can be swapped for a shared cache

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::{sync::Mutex, time::Instant};

use crate::response::ApiResponse;

/// Derive a stable cache key for `operation` called with `args`.
///
/// `serde_json` objects are ordered maps, so logically identical arguments
/// always serialize to the same bytes.
pub fn cache_key(operation: &str, args: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    hasher.update(b":");
    hasher.update(args.to_string().as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Swappable response cache.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// A fresh entry for `key`, or `None` if absent or older than its TTL.
    async fn get(&self, key: &str) -> Option<ApiResponse>;

    /// Store `value` under `key` for `ttl`. Unsuccessful responses are ignored.
    async fn put(&self, key: String, value: ApiResponse, ttl: Duration);

    async fn remove(&self, key: &str);

    /// Drop every expired entry. Returns how many were removed.
    async fn sweep(&self) -> usize;

    async fn clear(&self);

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    value: ApiResponse,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) < self.ttl
    }
}

/// In-process cache map.
///
/// There is no background timer: stale entries linger until the next `put`
/// (or an explicit `sweep`). `max_entries` bounds growth by evicting the
/// oldest entries once expired ones are gone.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_entries: Option<usize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(max_entries: Option<usize>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.filter(|n| *n > 0),
        }
    }
}

fn sweep_expired(map: &mut HashMap<String, CacheEntry>, now: Instant) -> usize {
    let before = map.len();
    map.retain(|_, e| e.is_fresh(now));
    before - map.len()
}

fn evict_oldest(map: &mut HashMap<String, CacheEntry>, keep: usize) {
    while map.len() > keep {
        let Some(oldest) = map
            .iter()
            .min_by_key(|(_, e)| e.inserted_at)
            .map(|(k, _)| k.clone())
        else {
            return;
        };
        map.remove(&oldest);
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<ApiResponse> {
        let now = Instant::now();
        let map = self.entries.lock().await;
        map.get(key)
            .filter(|e| e.is_fresh(now))
            .map(|e| e.value.clone())
    }

    async fn put(&self, key: String, value: ApiResponse, ttl: Duration) {
        if !value.success() || ttl.is_zero() {
            return;
        }

        let now = Instant::now();
        let mut map = self.entries.lock().await;
        map.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                ttl,
            },
        );

        let purged = sweep_expired(&mut map, now);
        if purged > 0 {
            tracing::debug!(purged, "cache: swept expired entries");
        }
        if let Some(max) = self.max_entries {
            evict_oldest(&mut map, max);
        }
    }

    async fn remove(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut map = self.entries.lock().await;
        sweep_expired(&mut map, now)
    }

    async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(n: i64) -> ApiResponse {
        ApiResponse::new(json!({ "status": "success", "n": n }), 200)
    }

    #[test]
    fn keys_are_deterministic_and_distinct() {
        let a = cache_key("get_user_tasks", &json!({ "telegram_id": 555 }));
        let b = cache_key("get_user_tasks", &json!({ "telegram_id": 555 }));
        let c = cache_key("get_user_tasks", &json!({ "telegram_id": 556 }));
        let d = cache_key("get_user_info", &json!({ "telegram_id": 555 }));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn key_ignores_object_field_order() {
        let a: Value = serde_json::from_str(r#"{"task_id":1,"telegram_id":2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"telegram_id":2,"task_id":1}"#).unwrap();
        assert_eq!(cache_key("op", &a), cache_key("op", &b));
    }

    #[tokio::test(start_paused = true)]
    async fn hit_within_ttl_miss_after() {
        let cache = MemoryCache::new();
        cache
            .put("k".to_string(), ok(1), Duration::from_secs(60))
            .await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("k").await, Some(ok(1)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("k").await, None);
        // Stale entry is still stored until the next insert.
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn put_sweeps_expired_entries() {
        let cache = MemoryCache::new();
        cache
            .put("short".to_string(), ok(1), Duration::from_secs(1))
            .await;
        cache
            .put("long".to_string(), ok(2), Duration::from_secs(300))
            .await;

        tokio::time::advance(Duration::from_secs(2)).await;
        cache
            .put("new".to_string(), ok(3), Duration::from_secs(60))
            .await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("short").await, None);
        assert_eq!(cache.get("long").await, Some(ok(2)));
    }

    #[tokio::test]
    async fn failures_are_never_stored() {
        let cache = MemoryCache::new();
        cache
            .put(
                "k".to_string(),
                ApiResponse::new(json!({ "message": "nope" }), 404),
                Duration::from_secs(60),
            )
            .await;
        cache
            .put(
                "v".to_string(),
                ApiResponse::validation("Invalid JSHIR format"),
                Duration::from_secs(60),
            )
            .await;
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn last_write_wins() {
        let cache = MemoryCache::new();
        cache
            .put("k".to_string(), ok(1), Duration::from_secs(60))
            .await;
        cache
            .put("k".to_string(), ok(2), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("k").await, Some(ok(2)));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_sweep_and_remove() {
        let cache = MemoryCache::new();
        cache
            .put("a".to_string(), ok(1), Duration::from_secs(1))
            .await;
        cache
            .put("b".to_string(), ok(2), Duration::from_secs(60))
            .await;

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.sweep().await, 1);
        assert!(!cache.is_empty().await);

        cache.remove("b").await;
        assert_eq!(cache.len().await, 0);
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn max_entries_evicts_oldest() {
        let cache = MemoryCache::with_max_entries(Some(2));
        for (i, k) in ["a", "b", "c"].iter().enumerate() {
            cache
                .put(k.to_string(), ok(i as i64), Duration::from_secs(60))
                .await;
            tokio::time::advance(Duration::from_millis(10)).await;
        }
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("a").await, None);
        assert!(cache.get("c").await.is_some());
    }
}
