//! LRU Order Module
//!
//! Access order for the evictable cache entries of the memory store.

use std::collections::{BTreeMap, HashMap};

// == LRU Order ==
/// Every touch stamps the key with a fresh tick; the smallest tick is the
/// least recently used key.
#[derive(Debug, Default)]
pub(crate) struct LruOrder {
    next_tick: u64,
    tick_of: HashMap<String, u64>,
    by_tick: BTreeMap<u64, String>,
}

impl LruOrder {
    /// Marks `key` as most recently used, tracking it if new.
    pub fn touch(&mut self, key: &str) {
        if let Some(old) = self.tick_of.remove(key) {
            self.by_tick.remove(&old);
        }
        let tick = self.next_tick;
        self.next_tick += 1;
        self.tick_of.insert(key.to_string(), tick);
        self.by_tick.insert(tick, key.to_string());
    }

    pub fn remove(&mut self, key: &str) {
        if let Some(tick) = self.tick_of.remove(key) {
            self.by_tick.remove(&tick);
        }
    }

    /// Stops tracking and returns the least recently used key.
    pub fn pop_oldest(&mut self) -> Option<String> {
        let (_, key) = self.by_tick.pop_first()?;
        self.tick_of.remove(&key);
        Some(key)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tick_of.len()
    }
}
