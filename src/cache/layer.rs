//! Read-Through Cache Layer
//!
//! Sits in front of the record store. Payloads are stored already serialized
//! and served back verbatim. Store failures go through the configured
//! [`FailurePolicy`]; under the default `FailOpen` they are logged and the
//! caller falls through to the record store.
//!
//! Every payload is stamped with the generation its reader saw before
//! fetching. Invalidation rotates the generation first, so a fetch that
//! raced a write lands under a stamp no reader will look up again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::{CacheKey, CacheStats};
use crate::error::{AppError, Result};
use crate::store::{CounterStore, FailurePolicy, StoreResult};

/// Lifetime of a generation key. Outlives every payload TTL the services use.
const GENERATION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// What to drop from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidate {
    Key(CacheKey),
    Prefix(String),
}

fn fresh_generation() -> String {
    Uuid::new_v4().simple().to_string()
}

// == Read-Through Cache ==
pub struct ReadThroughCache {
    store: Arc<dyn CounterStore>,
    policy: FailurePolicy,
    stats: Mutex<CacheStats>,
}

impl ReadThroughCache {
    /// Creates a fail-open cache over `store`.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            policy: FailurePolicy::FailOpen,
            stats: Mutex::new(CacheStats::new()),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    // == Generations ==
    /// Current generation of `key`, starting one if there is none yet.
    ///
    /// Not a cache read as far as the stats go.
    async fn generation(&self, key: &CacheKey) -> Result<String> {
        let gen_key = key.generation_key();
        let result = self.store.get(&gen_key).await.map(Some);
        match self.absorb("get", &gen_key, result, None).await? {
            Some(Some(generation)) => Ok(generation),
            Some(None) => {
                let generation = fresh_generation();
                let result = self.store.set(&gen_key, &generation, GENERATION_TTL).await;
                self.absorb("set", &gen_key, result, ()).await?;
                Ok(generation)
            }
            // Store down: any stamp will do, nothing is read or written
            None => Ok(fresh_generation()),
        }
    }

    /// Replaces the generation stored at `gen_key`.
    async fn rotate(&self, gen_key: &str) -> Result<()> {
        let result = self
            .store
            .set(gen_key, &fresh_generation(), GENERATION_TTL)
            .await;
        self.absorb("set", gen_key, result, ()).await
    }

    // == Get ==
    /// Returns the cached payload for `key`, if any.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<String>> {
        let generation = self.generation(key).await?;
        self.get_stamped(key, &generation).await
    }

    async fn get_stamped(&self, key: &CacheKey, generation: &str) -> Result<Option<String>> {
        let key = key.stamped(generation);
        let result = self.store.get(&key).await;
        let payload = self.absorb("get", &key, result, None).await?;

        let mut stats = self.stats.lock().await;
        if payload.is_some() {
            stats.record_hit();
            debug!(key = %key, "Cache hit");
        } else {
            stats.record_miss();
            debug!(key = %key, "Cache miss");
        }
        Ok(payload)
    }

    // == Set ==
    pub async fn set(&self, key: &CacheKey, payload: &str, ttl: Duration) -> Result<()> {
        let generation = self.generation(key).await?;
        self.set_stamped(key, &generation, payload, ttl).await
    }

    async fn set_stamped(
        &self,
        key: &CacheKey,
        generation: &str,
        payload: &str,
        ttl: Duration,
    ) -> Result<()> {
        let key = key.stamped(generation);
        let result = self.store.set(&key, payload, ttl).await;
        self.absorb("set", &key, result, ()).await
    }

    // == Invalidate ==
    pub async fn invalidate(&self, target: Invalidate) -> Result<()> {
        match target {
            Invalidate::Key(key) => {
                let key = key.stamped(&self.generation(&key).await?);
                self.stats.lock().await.record_invalidation();
                let result = self.store.delete(&key).await.map(|_| ());
                self.absorb("delete", &key, result, ()).await
            }
            Invalidate::Prefix(prefix) => {
                self.stats.lock().await.record_invalidation();
                let result = self.store.delete_prefix(&prefix).await.map(|removed| {
                    debug!(prefix = %prefix, removed, "Invalidated listing pages");
                });
                self.absorb("delete_prefix", &prefix, result, ()).await
            }
        }
    }

    /// Drops every listing page of `entity`.
    ///
    /// All pages go because an insert or delete shifts every page offset.
    pub async fn invalidate_listings(&self, entity: &'static str) -> Result<()> {
        self.rotate(&CacheKey::listing_generation_key(entity)).await?;
        self.invalidate(Invalidate::Prefix(CacheKey::listing_prefix(entity)))
            .await
    }

    /// Drops the record's own cached copy and every listing page of its
    /// entity type.
    pub async fn invalidate_entity(&self, entity: &'static str, id: &str) -> Result<()> {
        self.rotate(&CacheKey::entity_generation_key(entity, id))
            .await?;
        self.stats.lock().await.record_invalidation();
        self.invalidate_listings(entity).await
    }

    // == Read Through ==
    /// Serves `key` from the cache, or runs `fetch` and caches its payload
    /// for `ttl`. A `None` from `fetch` (not found) is not cached.
    ///
    /// The payload is written under the generation read before `fetch` ran;
    /// an invalidation in between leaves it unreachable.
    pub async fn read_through<F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        fetch: F,
    ) -> Result<Option<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<String>>>,
    {
        let generation = self.generation(key).await?;
        if let Some(payload) = self.get_stamped(key, &generation).await? {
            return Ok(Some(payload));
        }

        let Some(payload) = fetch().await? else {
            return Ok(None);
        };

        self.set_stamped(key, &generation, &payload, ttl).await?;
        Ok(Some(payload))
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        *self.stats.lock().await
    }

    async fn absorb<T>(
        &self,
        op: &'static str,
        key: &str,
        result: StoreResult<T>,
        fallback: T,
    ) -> Result<T> {
        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        self.stats.lock().await.record_error();
        match self.policy {
            FailurePolicy::FailOpen => {
                warn!(op, key, error = %err, "Cache store call failed, bypassing cache");
                Ok(fallback)
            }
            FailurePolicy::FailClosed => {
                error!(op, key, error = %err, "Cache store call failed");
                Err(AppError::CacheUnavailable(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BucketSpec, MemoryStore, StoreError, TokenGrant, WindowCount};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DownStore;

    #[async_trait]
    impl CounterStore for DownStore {
        async fn get(&self, _: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn set(&self, _: &str, _: &str, _: Duration) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn delete(&self, _: &str) -> StoreResult<bool> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn delete_prefix(&self, _: &str) -> StoreResult<usize> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn incr_with_expiry(&self, _: &str, _: Duration) -> StoreResult<WindowCount> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn take_token(&self, _: &str, _: BucketSpec) -> StoreResult<TokenGrant> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    fn memory_cache() -> ReadThroughCache {
        ReadThroughCache::new(Arc::new(MemoryStore::new(100)))
    }

    #[tokio::test]
    async fn test_read_through_fetches_once() {
        let cache = memory_cache();
        let key = CacheKey::listing("post", 1, 10);
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(r#"{"posts":[]}"#.to_string()))
        };

        let first = cache.read_through(&key, Duration::from_secs(300), fetch).await.unwrap();
        let second = cache.read_through(&key, Duration::from_secs(300), fetch).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let cache = memory_cache();
        let key = CacheKey::entity("post", "missing");

        let result = cache
            .read_through(&key, Duration::from_secs(60), || async { Ok(None) })
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entity_key_used_for_read_and_write() {
        let cache = memory_cache();
        let key = CacheKey::entity("post", "abc");

        cache
            .read_through(&key, Duration::from_secs(60), || async {
                Ok(Some("payload".to_string()))
            })
            .await
            .unwrap();

        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn test_invalidate_entity_drops_all_listing_pages() {
        let cache = memory_cache();
        let ttl = Duration::from_secs(60);
        let page1 = CacheKey::listing("post", 1, 10);
        let page2 = CacheKey::listing("post", 2, 5);
        let detail = CacheKey::entity("post", "abc");
        let other = CacheKey::entity("post", "xyz");

        for key in [&page1, &page2, &detail, &other] {
            cache.set(key, "payload", ttl).await.unwrap();
        }

        cache.invalidate_entity("post", "abc").await.unwrap();

        assert!(cache.get(&page1).await.unwrap().is_none());
        assert!(cache.get(&page2).await.unwrap().is_none());
        assert!(cache.get(&detail).await.unwrap().is_none());
        assert!(cache.get(&other).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fail_open_serves_from_source() {
        let cache = ReadThroughCache::new(Arc::new(DownStore));
        let key = CacheKey::listing("post", 1, 10);

        let result = cache
            .read_through(&key, Duration::from_secs(60), || async {
                Ok(Some("fresh".to_string()))
            })
            .await
            .unwrap();
        assert_eq!(result.as_deref(), Some("fresh"));

        cache.invalidate_entity("post", "abc").await.unwrap();

        let stats = cache.stats().await;
        // Read: generation, payload get, payload set.
        // Invalidation: two rotations, delete_prefix.
        assert_eq!(stats.errors, 6);
    }

    #[tokio::test]
    async fn test_invalidate_listings_keeps_records() {
        let cache = memory_cache();
        let ttl = Duration::from_secs(60);
        let page = CacheKey::listing("post", 1, 10);
        let detail = CacheKey::entity("post", "abc");

        cache.set(&page, "page", ttl).await.unwrap();
        cache.set(&detail, "post", ttl).await.unwrap();
        cache.invalidate_listings("post").await.unwrap();

        assert!(cache.get(&page).await.unwrap().is_none());
        assert_eq!(cache.get(&detail).await.unwrap().as_deref(), Some("post"));
    }

    #[tokio::test]
    async fn test_fetch_racing_a_delete_is_not_served() {
        let cache = memory_cache();
        let key = CacheKey::entity("post", "abc");
        let ttl = Duration::from_secs(60);

        // The record is deleted while the first reader is still fetching it
        let racing = &cache;
        let stale = cache
            .read_through(&key, ttl, move || async move {
                racing.invalidate_entity("post", "abc").await?;
                Ok(Some("deleted post".to_string()))
            })
            .await
            .unwrap();
        assert_eq!(stale.as_deref(), Some("deleted post"));

        let next = cache
            .read_through(&key, ttl, || async { Ok(None) })
            .await
            .unwrap();
        assert!(next.is_none(), "Stale copy written after the delete was served");
    }

    #[tokio::test]
    async fn test_fetch_racing_a_create_is_refetched() {
        let cache = memory_cache();
        let key = CacheKey::listing("post", 1, 10);
        let ttl = Duration::from_secs(60);
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let racing = &cache;
        cache
            .read_through(&key, ttl, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                racing.invalidate_listings("post").await?;
                Ok(Some("old page".to_string()))
            })
            .await
            .unwrap();

        let fresh = cache
            .read_through(&key, ttl, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Some("new page".to_string()))
            })
            .await
            .unwrap();

        assert_eq!(fresh.as_deref(), Some("new page"));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_lost_generation_orphans_old_payloads() {
        let store = Arc::new(MemoryStore::new(100));
        let cache = ReadThroughCache::new(store.clone());
        let key = CacheKey::entity("post", "abc");

        cache.set(&key, "payload", Duration::from_secs(60)).await.unwrap();
        store.delete(&key.generation_key()).await.unwrap();

        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_closed_surfaces_error() {
        let cache =
            ReadThroughCache::new(Arc::new(DownStore)).with_policy(FailurePolicy::FailClosed);
        let key = CacheKey::listing("post", 1, 10);

        let result = cache
            .read_through(&key, Duration::from_secs(60), || async {
                Ok(Some("fresh".to_string()))
            })
            .await;

        assert!(matches!(result, Err(AppError::CacheUnavailable(_))));
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let cache = memory_cache();
        let key = CacheKey::entity("post", "abc");

        let result = cache
            .read_through(&key, Duration::from_secs(60), || async {
                Err(AppError::StoreUnavailable("db down".into()))
            })
            .await;

        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    }
}
