//! In-process record store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Page, Post, RecordStore, SortOrder};
use crate::error::Result;

/// Posts kept in insertion order behind an async RwLock.
#[derive(Debug, Default)]
pub struct MemoryRecords {
    posts: RwLock<Vec<Post>>,
}

impl MemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.posts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.posts.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecords {
    async fn find_by_id(&self, id: &str) -> Result<Option<Post>> {
        let posts = self.posts.read().await;
        Ok(posts.iter().find(|post| post.id == id).cloned())
    }

    async fn find_page(&self, skip: usize, limit: usize, sort: SortOrder) -> Result<Page> {
        let posts = self.posts.read().await;

        // Stable sort keeps insertion order between equal timestamps
        let mut ordered: Vec<&Post> = posts.iter().collect();
        ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        if sort == SortOrder::NewestFirst {
            ordered.reverse();
        }

        let items = ordered
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect();

        Ok(Page {
            items,
            total: posts.len(),
        })
    }

    async fn save(&self, post: Post) -> Result<Post> {
        let mut posts = self.posts.write().await;
        match posts.iter_mut().find(|existing| existing.id == post.id) {
            Some(existing) => *existing = post.clone(),
            None => posts.push(post.clone()),
        }
        Ok(post)
    }

    async fn delete_by_id(&self, id: &str) -> Result<Option<Post>> {
        let mut posts = self.posts.write().await;
        let removed = posts
            .iter()
            .position(|post| post.id == id)
            .map(|index| posts.remove(index));
        Ok(removed)
    }
}
