//! Cache Module
//!
//! Read-through cache for post listings and single-post lookups, with
//! pagination-aware keys and bulk invalidation on writes.

mod keys;
mod layer;
mod stats;


// Re-export public types
pub use keys::CacheKey;
pub use layer::{Invalidate, ReadThroughCache};
pub use stats::CacheStats;

// == Public Constants ==
/// Entity type name used in post cache keys
pub const POST_ENTITY: &str = "post";
