//! Memory store sweep
//!
//! Reads already skip expired entries and full token buckets; the sweep only
//! bounds memory between reads.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::store::MemoryStore;

/// Sweeps `store` every `every_secs` seconds (at least one) until aborted.
///
/// Keep the returned handle and abort it on shutdown.
pub fn spawn_cleanup_task(store: Arc<MemoryStore>, every_secs: u64) -> JoinHandle<()> {
    let period = Duration::from_secs(every_secs.max(1));

    tokio::spawn(async move {
        info!(period_secs = period.as_secs(), "Memory store sweep started");

        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match store.cleanup_expired().await {
                0 => debug!("Sweep found nothing to remove"),
                removed => {
                    let remaining = store.len().await;
                    info!(removed, remaining, "Swept expired keys");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CounterStore;

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let store = Arc::new(MemoryStore::new(100));
        store
            .set("expire_soon", "value", Duration::from_millis(500))
            .await
            .unwrap();

        let handle = spawn_cleanup_task(store.clone(), 1);

        // Wait for the entry to expire and one sweep to run
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.len().await, 0, "Expired entry should have been swept");
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let store = Arc::new(MemoryStore::new(100));
        store
            .set("long_lived", "value", Duration::from_secs(3600))
            .await
            .unwrap();

        let handle = spawn_cleanup_task(store.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.get("long_lived").await.unwrap().as_deref(), Some("value"));
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let store = Arc::new(MemoryStore::new(100));

        let handle = spawn_cleanup_task(store, 1);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
