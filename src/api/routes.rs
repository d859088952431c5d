//! API Routes
//!
//! Configures the Axum router for the post service.

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::auth::require_user;
use super::handlers::{
    create_post, delete_post, get_post, health_handler, list_posts, stats_handler, AppState,
};
use crate::admission::{enforce, AdmissionLayer};

/// Creates the post service router.
///
/// # Endpoints
/// - `POST /api/posts/create-post` - Create a post
/// - `GET /api/posts/get-posts` - Paginated listing (cached)
/// - `GET /api/posts/:id` - Single post (cached)
/// - `DELETE /api/posts/:id` - Delete own post
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check endpoint
///
/// Every `/api/posts` route requires `x-user-id`, then passes the
/// `sensitive` admission tier.
pub fn create_router(state: AppState, sensitive: AdmissionLayer) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Last layer added runs first: auth, then the limiter
    let posts = Router::new()
        .route("/create-post", post(create_post))
        .route("/get-posts", get(list_posts))
        .route("/:id", get(get_post).delete(delete_post))
        .layer(from_fn_with_state(sensitive, enforce))
        .layer(from_fn(require_user));

    Router::new()
        .nest("/api/posts", posts)
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
