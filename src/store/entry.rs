//! Store Entry Module
//!
//! A value held by the in-memory store. Every entry carries a deadline;
//! cache payloads and window counters alike are written with a TTL.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// == Store Entry ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub value: String,
    /// Unix milliseconds after which the entry is gone
    pub expires_at: u64,
}

impl StoreEntry {
    /// Creates an entry written at `now_ms` that lives for `ttl`.
    pub fn new(value: String, ttl: Duration, now_ms: u64) -> Self {
        Self {
            value,
            expires_at: now_ms.saturating_add(ttl.as_millis() as u64),
        }
    }

    /// Expired once the clock reaches the deadline, so a fully elapsed TTL is
    /// never served.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    /// Time left at `now_ms`; zero once expired.
    pub fn remaining_at(&self, now_ms: u64) -> Duration {
        Duration::from_millis(self.expires_at.saturating_sub(now_ms))
    }
}

/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
