//! API Handlers
//!
//! HTTP request handlers for the post service. Reads go through the
//! read-through cache and return the cached JSON verbatim; writes go to the
//! record store first and then invalidate.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use tracing::info;

use super::auth::AuthUser;
use crate::cache::{CacheKey, ReadThroughCache, POST_ENTITY};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{
    CreatePostRequest, CreatedResponse, HealthResponse, ListQuery, MessageResponse, PostListing,
    StatsResponse,
};
use crate::records::{Post, RecordStore, SortOrder};
use crate::store::CounterStore;

/// Application state shared across all post service handlers.
#[derive(Clone)]
pub struct AppState {
    /// Source of truth
    pub records: Arc<dyn RecordStore>,
    /// Read-through cache in front of `records`
    pub cache: Arc<ReadThroughCache>,
    pub listing_ttl: Duration,
    pub post_ttl: Duration,
    pub max_page_size: u32,
}

impl AppState {
    /// Creates a new AppState with the default TTLs (300s listings, 3600s posts).
    pub fn new(records: Arc<dyn RecordStore>, cache: ReadThroughCache) -> Self {
        let defaults = Config::default();
        Self {
            records,
            cache: Arc::new(cache),
            listing_ttl: defaults.listing_ttl(),
            post_ttl: defaults.post_ttl(),
            max_page_size: defaults.max_page_size,
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(
        config: &Config,
        records: Arc<dyn RecordStore>,
        store: Arc<dyn CounterStore>,
    ) -> Self {
        Self {
            records,
            cache: Arc::new(ReadThroughCache::new(store)),
            listing_ttl: config.listing_ttl(),
            post_ttl: config.post_ttl(),
            max_page_size: config.max_page_size,
        }
    }
}

/// Wraps an already serialized JSON document.
fn json_payload(status: StatusCode, payload: String) -> Response {
    let mut response = (status, payload).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|err| AppError::Internal(err.to_string()))
}

/// Handler for POST /api/posts/create-post
pub async fn create_post(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    payload: std::result::Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    let Json(req) = payload?;
    if let Some(error_msg) = req.validate() {
        return Err(AppError::InvalidRequest(error_msg));
    }

    let post = state
        .records
        .save(Post::new(user_id, req.content, req.media_ids))
        .await?;
    state.cache.invalidate_listings(POST_ENTITY).await?;

    info!(post_id = %post.id, author = %post.author_id, "Post created");
    Ok((StatusCode::CREATED, Json(CreatedResponse::new(post.id))))
}

/// Handler for GET /api/posts/get-posts
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response> {
    let (page, limit) = query.resolve(state.max_page_size);
    let key = CacheKey::listing(POST_ENTITY, page, limit);
    let records = state.records.clone();

    let payload = state
        .cache
        .read_through(&key, state.listing_ttl, || async move {
            let skip = (page as usize - 1).saturating_mul(limit as usize);
            let found = records
                .find_page(skip, limit as usize, SortOrder::NewestFirst)
                .await?;
            let listing = PostListing::new(found.items, page, limit, found.total as u64);
            to_json(&listing).map(Some)
        })
        .await?
        .ok_or_else(|| AppError::Internal("listing fetch produced no payload".to_string()))?;

    Ok(json_payload(StatusCode::OK, payload))
}

/// Handler for GET /api/posts/:id
pub async fn get_post(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let key = CacheKey::entity(POST_ENTITY, id.clone());
    let records = state.records.clone();

    let payload = state
        .cache
        .read_through(&key, state.post_ttl, || async move {
            match records.find_by_id(&id).await? {
                Some(post) => to_json(&post).map(Some),
                None => Ok(None),
            }
        })
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    Ok(json_payload(StatusCode::OK, payload))
}

/// Handler for DELETE /api/posts/:id
///
/// Only the author may delete; anyone else gets the same 404 as for a
/// missing post.
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let owned = state
        .records
        .find_by_id(&id)
        .await?
        .filter(|post| post.is_authored_by(&user_id));
    if owned.is_none() {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    if state.records.delete_by_id(&id).await?.is_none() {
        return Err(AppError::NotFound("Post not found".to_string()));
    }
    state.cache.invalidate_entity(POST_ENTITY, &id).await?;

    info!(post_id = %id, "Post deleted");
    Ok(Json(MessageResponse::ok("Post deleted successfully")))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats().await;
    Json(StatsResponse::new(&stats, state.cache.policy().to_string()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("posts"))
}
