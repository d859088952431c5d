//! Gateway Routes

use axum::{
    middleware::from_fn_with_state,
    routing::{any, get},
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::proxy::{proxy_identity, proxy_posts, GatewayState};
use crate::admission::{enforce, AdmissionLayer};
use crate::models::HealthResponse;

/// Creates the gateway router.
///
/// # Endpoints
/// - `/v1/auth/*` - Proxied to the identity service
/// - `/v1/posts`, `/v1/posts/*` - Proxied to the post service, bearer token required
/// - `GET /health` - Health check endpoint
///
/// The `global` admission tier runs in front of every route.
pub fn create_gateway_router(state: GatewayState, global: AdmissionLayer) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/auth/*rest", any(proxy_identity))
        .route("/v1/posts", any(proxy_posts))
        .route("/v1/posts/*rest", any(proxy_posts))
        .route("/health", get(gateway_health))
        .layer(from_fn_with_state(global, enforce))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn gateway_health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("gateway"))
}
