//! Response DTOs for the services
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::records::Post;

/// One page of the post listing (GET /api/posts/get-posts)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListing {
    pub posts: Vec<Post>,
    pub current_page: u32,
    pub total_pages: u64,
    pub total_posts: u64,
}

impl PostListing {
    pub fn new(posts: Vec<Post>, current_page: u32, limit: u32, total_posts: u64) -> Self {
        let total_pages = total_posts.div_ceil(u64::from(limit.max(1)));
        Self {
            posts,
            current_page,
            total_pages,
            total_posts,
        }
    }
}

/// Response body for POST /api/posts/create-post
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResponse {
    pub success: bool,
    pub message: String,
    pub post_id: String,
}

impl CreatedResponse {
    pub fn new(post_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message: "Post created successfully".to_string(),
            post_id: post_id.into(),
        }
    }
}

/// Plain `{ success, message }` acknowledgement
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Store failures absorbed by the cache
    pub errors: u64,
    /// Invalidation calls
    pub invalidations: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Failure policy of the cache
    pub policy: String,
}

impl StatsResponse {
    pub fn new(stats: &CacheStats, policy: impl Into<String>) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            errors: stats.errors,
            invalidations: stats.invalidations,
            hit_rate: stats.hit_rate(),
            policy: policy.into(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Which role answered
    pub service: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(service: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            service: service.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Rejection body for all error conditions: `{ success: false, message }`
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
