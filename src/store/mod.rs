//! Counter Store Module
//!
//! The shared key/value store behind both the cache layer and the admission
//! controller. Every component receives an `Arc<dyn CounterStore>` at
//! construction.

mod entry;
mod lru;
mod memory;
mod redis_store;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use entry::{current_timestamp_ms, StoreEntry};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

// == Store Error ==
/// Failures reported by a counter store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend could not be reached or the command failed in transit
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored value has the wrong shape for the requested operation
    #[error("corrupt value at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Key or value exceeds the store limits
    #[error("rejected: {0}")]
    Rejected(String),

    /// In-memory counter table is full of live counters
    #[error("store full ({0} counters)")]
    Full(usize),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Failure Policy ==
/// What a component does when its store call fails.
///
/// The cache defaults to `FailOpen`, the admission controller to `FailClosed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Bypass the store and carry on
    FailOpen,
    /// Refuse the operation
    FailClosed,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::FailOpen => f.write_str("fail-open"),
            FailurePolicy::FailClosed => f.write_str("fail-closed"),
        }
    }
}

// == Counter Primitives ==
/// Result of an atomic increment inside a fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Counter value after this increment
    pub count: u64,
    /// Time until the window (and the counter) expires
    pub resets_in: Duration,
}

/// Token bucket shape: `capacity` tokens, fully refilled every `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSpec {
    pub capacity: u64,
    pub period: Duration,
}

impl BucketSpec {
    /// Milliseconds needed to refill a single token.
    pub fn ms_per_token(&self) -> f64 {
        self.period.as_millis() as f64 / self.capacity.max(1) as f64
    }
}

/// Outcome of taking one token from a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenGrant {
    pub allowed: bool,
    /// Whole tokens left after this attempt
    pub remaining: u64,
    /// Wait until the next token is available; zero when allowed
    pub retry_after: Duration,
}

// == Counter Store Trait ==
/// Shared key/value store with TTL and atomic counter primitives.
///
/// Implementations must be safe under concurrent access from many tasks, and
/// a shared backend must also be safe across processes. `incr_with_expiry`
/// and `take_token` are single atomic operations on the backend.
#[async_trait]
pub trait CounterStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Deletes every key starting with `prefix`, returning how many went.
    async fn delete_prefix(&self, prefix: &str) -> StoreResult<usize>;

    /// Increments `key`, starting a new window of length `window` when the
    /// key is absent or expired.
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> StoreResult<WindowCount>;

    /// Takes one token from the bucket at `key`, refilling it first.
    async fn take_token(&self, key: &str, bucket: BucketSpec) -> StoreResult<TokenGrant>;
}

/// Rejects keys the backends would refuse anyway.
pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::Rejected("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(StoreError::Rejected(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
