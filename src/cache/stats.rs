//! Cache Statistics Module
//!
//! Counters for the read-through layer. Served at `GET /stats`.

// == Cache Stats ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from the cache
    pub hits: u64,
    /// Reads that fell through to the record store
    pub misses: u64,
    /// Store calls that failed and were absorbed by the failure policy
    pub errors: u64,
    /// Invalidation calls (key or prefix)
    pub invalidations: u64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache reads so far, hits and misses together.
    pub fn reads(&self) -> u64 {
        self.hits + self.misses
    }

    /// hits / reads, or 0.0 before the first read.
    pub fn hit_rate(&self) -> f64 {
        match self.reads() {
            0 => 0.0,
            reads => self.hits as f64 / reads as f64,
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn record_invalidation(&mut self) {
        self.invalidations += 1;
    }
}
