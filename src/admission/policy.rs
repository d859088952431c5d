//! Limit policies for admission tiers.

use std::time::Duration;

use crate::store::BucketSpec;

/// How a tier counts requests per identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitPolicy {
    /// At most `max` requests per `window`; the counter resets once the
    /// window has elapsed.
    FixedWindow { max: u64, window: Duration },
    /// `capacity` requests per `period`, refilled continuously.
    TokenBucket(BucketSpec),
}

impl LimitPolicy {
    pub fn fixed_window(max: u64, window: Duration) -> Self {
        LimitPolicy::FixedWindow { max, window }
    }

    pub fn token_bucket(capacity: u64, period: Duration) -> Self {
        LimitPolicy::TokenBucket(BucketSpec { capacity, period })
    }

    /// Requests allowed in a full window or bucket.
    pub fn limit(&self) -> u64 {
        match self {
            LimitPolicy::FixedWindow { max, .. } => *max,
            LimitPolicy::TokenBucket(bucket) => bucket.capacity,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LimitPolicy::FixedWindow { .. } => "fixed-window",
            LimitPolicy::TokenBucket(_) => "token-bucket",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit() {
        assert_eq!(LimitPolicy::fixed_window(15, Duration::from_secs(60)).limit(), 15);
        assert_eq!(LimitPolicy::token_bucket(100, Duration::from_secs(60)).limit(), 100);
    }

    #[test]
    fn test_kind() {
        assert_eq!(
            LimitPolicy::fixed_window(1, Duration::from_secs(1)).kind(),
            "fixed-window"
        );
        assert_eq!(
            LimitPolicy::token_bucket(1, Duration::from_secs(1)).kind(),
            "token-bucket"
        );
    }
}
