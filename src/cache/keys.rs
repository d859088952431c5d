//! Cache Key Module
//!
//! Deterministic cache keys. Identical queries always produce the same key,
//! and every listing key of an entity type shares one prefix so a write can
//! drop them all at once.
//!
//! Payloads are stored under a key stamped with a generation. Rotating the
//! generation orphans every payload stamped with the old one, including any
//! a reader is still about to write.

use std::fmt;

// == Cache Key ==
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// One page of a listing: `{entity}:list:{page}:{limit}`
    Listing {
        entity: &'static str,
        page: u32,
        limit: u32,
    },
    /// One record: `{entity}:id:{id}`
    Entity { entity: &'static str, id: String },
}

impl CacheKey {
    pub fn listing(entity: &'static str, page: u32, limit: u32) -> Self {
        CacheKey::Listing {
            entity,
            page,
            limit,
        }
    }

    pub fn entity(entity: &'static str, id: impl Into<String>) -> Self {
        CacheKey::Entity {
            entity,
            id: id.into(),
        }
    }

    /// Prefix shared by every listing key of `entity`.
    pub fn listing_prefix(entity: &str) -> String {
        format!("{}:list:", entity)
    }

    /// Key holding the generation every listing page of `entity` is stamped with.
    pub fn listing_generation_key(entity: &str) -> String {
        format!("{}:gen:list", entity)
    }

    /// Key holding the generation of one record's cached copy.
    pub fn entity_generation_key(entity: &str, id: &str) -> String {
        format!("{}:gen:id:{}", entity, id)
    }

    pub fn generation_key(&self) -> String {
        match self {
            CacheKey::Listing { entity, .. } => Self::listing_generation_key(entity),
            CacheKey::Entity { entity, id } => Self::entity_generation_key(entity, id),
        }
    }

    /// Store key of this key's payload under `generation`.
    pub fn stamped(&self, generation: &str) -> String {
        format!("{}@{}", self, generation)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Listing {
                entity,
                page,
                limit,
            } => write!(f, "{}:list:{}:{}", entity, page, limit),
            CacheKey::Entity { entity, id } => write!(f, "{}:id:{}", entity, id),
        }
    }
}
