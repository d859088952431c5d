//! Memory Store Module
//!
//! Process-local counter store guarded by a single async mutex, so every
//! operation is atomic with respect to every other.
//!
//! Cache payloads written through `set` and the counters behind admission
//! have separate budgets of `max_entries` keys each. A full payload table
//! evicts its least recently used entry; a full counter table reclaims
//! expired counters and otherwise refuses. Payloads never take room from
//! counters.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::lru::LruOrder;
use super::{
    current_timestamp_ms, validate_key, BucketSpec, CounterStore, StoreEntry, StoreError,
    StoreResult, TokenGrant, WindowCount, MAX_VALUE_SIZE,
};

// == Bucket State ==
#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    updated_ms: u64,
    /// When the bucket is back to capacity; past this point it carries no state
    full_at_ms: u64,
}

impl Bucket {
    fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.full_at_ms
    }
}

#[derive(Debug, Default)]
struct Inner {
    /// Payloads written by `set`
    entries: HashMap<String, StoreEntry>,
    lru: LruOrder,
    /// Fixed-window counters
    counters: HashMap<String, StoreEntry>,
    buckets: HashMap<String, Bucket>,
}

impl Inner {
    fn len(&self) -> usize {
        self.entries.len() + self.counters.len() + self.buckets.len()
    }

    fn counter_len(&self) -> usize {
        self.counters.len() + self.buckets.len()
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        self.lru.remove(key);
        self.entries.remove(key).is_some()
    }

    fn purge_expired(&mut self, now_ms: u64) -> usize {
        let before = self.len();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now_ms))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.remove_entry(&key);
        }
        self.counters.retain(|_, counter| !counter.is_expired_at(now_ms));
        self.buckets.retain(|_, bucket| !bucket.is_expired_at(now_ms));
        before - self.len()
    }

    /// Makes room for one more payload, evicting the least recently used.
    fn make_room_for_entry(&mut self, max_entries: usize) -> StoreResult<()> {
        while self.entries.len() >= max_entries {
            let Some(oldest) = self.lru.pop_oldest() else {
                return Err(StoreError::Full(max_entries));
            };
            self.entries.remove(&oldest);
            debug!(key = %oldest, "Evicted least recently used entry");
        }
        Ok(())
    }

    /// Makes room for one more counter or bucket, reclaiming expired ones.
    fn make_room_for_counter(&mut self, max_entries: usize, now_ms: u64) -> StoreResult<()> {
        if self.counter_len() < max_entries {
            return Ok(());
        }
        self.counters.retain(|_, counter| !counter.is_expired_at(now_ms));
        self.buckets.retain(|_, bucket| !bucket.is_expired_at(now_ms));
        if self.counter_len() < max_entries {
            Ok(())
        } else {
            Err(StoreError::Full(max_entries))
        }
    }
}

// == Memory Store ==
/// In-memory counter store.
///
/// Safe for any number of tasks in one process. Not shared between
/// processes; use [`super::RedisStore`] when several instances run.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    /// Budget of the payload table, and separately of the counter table
    max_entries: usize,
}

impl MemoryStore {
    // == Constructor ==
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_entries,
        }
    }

    // == Cleanup Expired ==
    /// Removes expired payloads, expired counters and idle buckets.
    ///
    /// Returns the number of keys removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.purge_expired(current_timestamp_ms())
    }

    /// Returns the current number of keys, expired or not.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut inner = self.inner.lock().await;
        let now = current_timestamp_ms();

        match inner.counters.get(key) {
            Some(counter) if !counter.is_expired_at(now) => return Ok(Some(counter.value.clone())),
            Some(_) => {
                inner.counters.remove(key);
            }
            None => {}
        }

        let live = match inner.entries.get(key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired_at(now) => Some(entry.value.clone()),
            Some(_) => None,
        };

        match live {
            Some(value) => {
                inner.lru.touch(key);
                Ok(Some(value))
            }
            None => {
                // Lazy expiry
                inner.remove_entry(key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        validate_key(key)?;
        if value.len() > MAX_VALUE_SIZE {
            return Err(StoreError::Rejected(format!(
                "value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        let mut inner = self.inner.lock().await;
        let now = current_timestamp_ms();
        inner.counters.remove(key);
        if !inner.entries.contains_key(key) {
            inner.make_room_for_entry(self.max_entries)?;
        }
        inner
            .entries
            .insert(key.to_string(), StoreEntry::new(value.to_string(), ttl, now));
        inner.lru.touch(key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let removed_entry = inner.remove_entry(key);
        let removed_counter = inner.counters.remove(key).is_some();
        let removed_bucket = inner.buckets.remove(key).is_some();
        Ok(removed_entry || removed_counter || removed_bucket)
    }

    async fn delete_prefix(&self, prefix: &str) -> StoreResult<usize> {
        let mut inner = self.inner.lock().await;
        let before = inner.len();
        let matching: Vec<String> = inner
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        for key in matching {
            inner.remove_entry(&key);
        }
        inner.counters.retain(|key, _| !key.starts_with(prefix));
        inner.buckets.retain(|key, _| !key.starts_with(prefix));
        Ok(before - inner.len())
    }

    async fn incr_with_expiry(&self, key: &str, window: Duration) -> StoreResult<WindowCount> {
        validate_key(key)?;
        let mut inner = self.inner.lock().await;
        let now = current_timestamp_ms();

        // A live payload at this key becomes the counter, as INCR would treat it
        let promoted = match inner.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => Some(entry.clone()),
            _ => None,
        };
        if let Some(entry) = promoted {
            entry.value.parse::<u64>().map_err(|_| StoreError::Corrupt {
                key: key.to_string(),
                reason: "value is not an integer".to_string(),
            })?;
            inner.remove_entry(key);
            inner.counters.insert(key.to_string(), entry);
        }

        if let Some(counter) = inner
            .counters
            .get_mut(key)
            .filter(|counter| !counter.is_expired_at(now))
        {
            let current: u64 = counter.value.parse().map_err(|_| StoreError::Corrupt {
                key: key.to_string(),
                reason: "value is not an integer".to_string(),
            })?;
            let count = current + 1;
            counter.value = count.to_string();
            return Ok(WindowCount {
                count,
                resets_in: counter.remaining_at(now),
            });
        }

        if !inner.counters.contains_key(key) {
            inner.make_room_for_counter(self.max_entries, now)?;
        }
        inner
            .counters
            .insert(key.to_string(), StoreEntry::new("1".to_string(), window, now));
        Ok(WindowCount {
            count: 1,
            resets_in: window,
        })
    }

    async fn take_token(&self, key: &str, bucket: BucketSpec) -> StoreResult<TokenGrant> {
        validate_key(key)?;
        let mut inner = self.inner.lock().await;
        let now = current_timestamp_ms();
        let capacity = bucket.capacity as f64;
        let ms_per_token = bucket.ms_per_token();

        let previous = inner
            .buckets
            .get(key)
            .filter(|state| !state.is_expired_at(now))
            .copied();
        let mut tokens = match previous {
            Some(state) => {
                let elapsed = now.saturating_sub(state.updated_ms) as f64;
                (state.tokens + elapsed / ms_per_token).min(capacity)
            }
            None => {
                if !inner.buckets.contains_key(key) {
                    inner.make_room_for_counter(self.max_entries, now)?;
                }
                capacity
            }
        };

        let allowed = tokens >= 1.0;
        let retry_after = if allowed {
            tokens -= 1.0;
            Duration::ZERO
        } else {
            Duration::from_millis(((1.0 - tokens) * ms_per_token).ceil() as u64)
        };

        let full_at_ms = now + ((capacity - tokens) * ms_per_token).ceil() as u64;
        inner.buckets.insert(
            key.to_string(),
            Bucket {
                tokens,
                updated_ms: now,
                full_at_ms,
            },
        );

        Ok(TokenGrant {
            allowed,
            remaining: tokens.floor() as u64,
            retry_after,
        })
    }
}
