//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use serde_json::Value;

use micropost::error::Result;
use micropost::records::{MemoryRecords, Page, Post, RecordStore, SortOrder};
use micropost::store::{BucketSpec, CounterStore, StoreError, StoreResult, TokenGrant, WindowCount};

// == Counting Record Store ==
/// Wraps [`MemoryRecords`] and counts reads that reach it.
#[derive(Default)]
pub struct CountingRecords {
    inner: MemoryRecords,
    pub page_reads: AtomicUsize,
    pub id_reads: AtomicUsize,
}

impl CountingRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_reads(&self) -> usize {
        self.page_reads.load(Ordering::SeqCst)
    }

    pub fn id_reads(&self) -> usize {
        self.id_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for CountingRecords {
    async fn find_by_id(&self, id: &str) -> Result<Option<Post>> {
        self.id_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_id(id).await
    }

    async fn find_page(&self, skip: usize, limit: usize, sort: SortOrder) -> Result<Page> {
        self.page_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.find_page(skip, limit, sort).await
    }

    async fn save(&self, post: Post) -> Result<Post> {
        self.inner.save(post).await
    }

    async fn delete_by_id(&self, id: &str) -> Result<Option<Post>> {
        self.inner.delete_by_id(id).await
    }
}

// == Unreachable Store ==
/// Counter store whose every call fails like a refused connection.
pub struct DownStore;

fn refused<T>() -> StoreResult<T> {
    Err(StoreError::Unavailable("connection refused".to_string()))
}

#[async_trait]
impl CounterStore for DownStore {
    async fn get(&self, _: &str) -> StoreResult<Option<String>> {
        refused()
    }
    async fn set(&self, _: &str, _: &str, _: Duration) -> StoreResult<()> {
        refused()
    }
    async fn delete(&self, _: &str) -> StoreResult<bool> {
        refused()
    }
    async fn delete_prefix(&self, _: &str) -> StoreResult<usize> {
        refused()
    }
    async fn incr_with_expiry(&self, _: &str, _: Duration) -> StoreResult<WindowCount> {
        refused()
    }
    async fn take_token(&self, _: &str, _: BucketSpec) -> StoreResult<TokenGrant> {
        refused()
    }
}

// == Request Helpers ==
pub fn get_as(uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-id", user)
        .body(Body::empty())
        .unwrap()
}

pub fn delete_as(uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("x-user-id", user)
        .body(Body::empty())
        .unwrap()
}

pub fn create_as(user: &str, content: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/posts/create-post")
        .header("content-type", "application/json")
        .header("x-user-id", user)
        .body(Body::from(serde_json::json!({ "content": content }).to_string()))
        .unwrap()
}

pub async fn body_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX).await.unwrap().to_vec()
}

pub async fn body_to_json(body: Body) -> Value {
    serde_json::from_slice(&body_bytes(body).await).unwrap()
}
