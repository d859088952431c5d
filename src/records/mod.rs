//! Records Module
//!
//! The record store is the source of truth for posts. The cache layer sits
//! in front of it; nothing here knows about caching.

mod memory;
mod post;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::MemoryRecords;
pub use post::Post;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// One page of records plus the total count across all pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Post>,
    pub total: usize,
}

// == Record Store Trait ==
/// Document store adapter with find/save/delete-by-id semantics.
///
/// Backend failures surface as [`crate::error::AppError::StoreUnavailable`].
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    async fn find_by_id(&self, id: &str) -> Result<Option<Post>>;

    async fn find_page(&self, skip: usize, limit: usize, sort: SortOrder) -> Result<Page>;

    /// Inserts or replaces by id.
    async fn save(&self, post: Post) -> Result<Post>;

    async fn delete_by_id(&self, id: &str) -> Result<Option<Post>>;
}
