//! Admission Controller
//!
//! One rate-limit tier: a policy, a counter namespace and a failure policy
//! for when the counter store cannot be reached. Every check is a single
//! atomic store call; the decision is made from the value the store returns.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::LimitPolicy;
use crate::error::{AppError, Result};
use crate::store::{CounterStore, FailurePolicy};

/// Rejection message used when none is configured.
pub const DEFAULT_REJECTION: &str = "Too Many Requests";

// == Decision ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u64 },
    Denied { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

// == Admission Controller ==
pub struct AdmissionController {
    tier: String,
    policy: LimitPolicy,
    store: Arc<dyn CounterStore>,
    on_store_error: FailurePolicy,
    rejection: String,
}

impl AdmissionController {
    /// Creates a fail-closed tier named `tier`.
    pub fn new(tier: impl Into<String>, policy: LimitPolicy, store: Arc<dyn CounterStore>) -> Self {
        Self {
            tier: tier.into(),
            policy,
            store,
            on_store_error: FailurePolicy::FailClosed,
            rejection: DEFAULT_REJECTION.to_string(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_store_error = policy;
        self
    }

    /// Message returned in the 429 body.
    pub fn with_rejection(mut self, message: impl Into<String>) -> Self {
        self.rejection = message.into();
        self
    }

    pub fn tier(&self) -> &str {
        &self.tier
    }

    pub fn policy(&self) -> LimitPolicy {
        self.policy
    }

    pub fn limit(&self) -> u64 {
        self.policy.limit()
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.on_store_error
    }

    fn counter_key(&self, identity: &str) -> String {
        format!("rl:{}:{}", self.tier, identity)
    }

    /// Counts one attempt by `identity` and decides on it.
    ///
    /// Errors only when the store fails and the tier is fail-closed.
    pub async fn check(&self, identity: &str) -> Result<Decision> {
        let key = self.counter_key(identity);

        let outcome = match self.policy {
            LimitPolicy::FixedWindow { max, window } => self
                .store
                .incr_with_expiry(&key, window)
                .await
                .map(|counted| {
                    if counted.count <= max {
                        Decision::Allowed {
                            remaining: max - counted.count,
                        }
                    } else {
                        Decision::Denied {
                            retry_after: counted.resets_in,
                        }
                    }
                }),
            LimitPolicy::TokenBucket(bucket) => {
                self.store.take_token(&key, bucket).await.map(|grant| {
                    if grant.allowed {
                        Decision::Allowed {
                            remaining: grant.remaining,
                        }
                    } else {
                        Decision::Denied {
                            retry_after: grant.retry_after,
                        }
                    }
                })
            }
        };

        match outcome {
            Ok(decision @ Decision::Denied { retry_after }) => {
                warn!(
                    tier = %self.tier,
                    identity,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Rate limit exceeded for IP: {}",
                    identity
                );
                Ok(decision)
            }
            Ok(decision) => {
                debug!(tier = %self.tier, identity, ?decision, "Admitted");
                Ok(decision)
            }
            Err(err) => match self.on_store_error {
                FailurePolicy::FailClosed => {
                    error!(tier = %self.tier, identity, error = %err, "Counter store failed, denying request");
                    Err(AppError::AdmissionUnavailable(err.to_string()))
                }
                FailurePolicy::FailOpen => {
                    warn!(tier = %self.tier, identity, error = %err, "Counter store failed, admitting request");
                    Ok(Decision::Allowed {
                        remaining: self.limit(),
                    })
                }
            },
        }
    }

    /// Turns a denial into the 429 error.
    pub fn rejection(&self, retry_after: Duration) -> AppError {
        AppError::RateLimited {
            message: self.rejection.clone(),
            retry_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn controller(policy: LimitPolicy) -> AdmissionController {
        AdmissionController::new("sensitive", policy, Arc::new(MemoryStore::new(1000)))
    }

    #[tokio::test]
    async fn test_fixed_window_denies_over_limit() {
        let limiter = controller(LimitPolicy::fixed_window(15, Duration::from_secs(60)));

        for i in 0..15 {
            let decision = limiter.check("10.0.0.1").await.unwrap();
            assert_eq!(decision, Decision::Allowed { remaining: 14 - i });
        }

        let decision = limiter.check("10.0.0.1").await.unwrap();
        match decision {
            Decision::Denied { retry_after } => {
                assert!(retry_after <= Duration::from_secs(60));
                assert!(retry_after > Duration::from_secs(50));
            }
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_identities_are_independent() {
        let limiter = controller(LimitPolicy::fixed_window(1, Duration::from_secs(60)));

        assert!(limiter.check("10.0.0.1").await.unwrap().is_allowed());
        assert!(!limiter.check("10.0.0.1").await.unwrap().is_allowed());
        assert!(limiter.check("10.0.0.2").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_tiers_do_not_share_counters() {
        let store: Arc<dyn CounterStore> = Arc::new(MemoryStore::new(1000));
        let policy = LimitPolicy::fixed_window(1, Duration::from_secs(60));
        let gateway = AdmissionController::new("gateway", policy, store.clone());
        let sensitive = AdmissionController::new("sensitive", policy, store);

        assert!(gateway.check("10.0.0.1").await.unwrap().is_allowed());
        assert!(sensitive.check("10.0.0.1").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_token_bucket_tier() {
        let limiter = controller(LimitPolicy::token_bucket(2, Duration::from_secs(60)));

        assert!(limiter.check("ip").await.unwrap().is_allowed());
        assert!(limiter.check("ip").await.unwrap().is_allowed());
        assert!(!limiter.check("ip").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_rejection_uses_configured_message() {
        let limiter = controller(LimitPolicy::fixed_window(1, Duration::from_secs(60)))
            .with_rejection("Too Many Requests on sensitive endpoint");

        match limiter.rejection(Duration::from_secs(5)) {
            AppError::RateLimited {
                message,
                retry_after,
            } => {
                assert_eq!(message, "Too Many Requests on sensitive endpoint");
                assert_eq!(retry_after, Duration::from_secs(5));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
