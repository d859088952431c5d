//! API Module
//!
//! HTTP handlers and routing for the post service.
//!
//! # Endpoints
//! - `POST /api/posts/create-post` - Create a post
//! - `GET /api/posts/get-posts` - Paginated listing
//! - `GET /api/posts/:id` - Single post
//! - `DELETE /api/posts/:id` - Delete a post
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod auth;
pub mod handlers;
pub mod routes;

pub use auth::{require_user, AuthUser, USER_ID_HEADER};
pub use handlers::*;
pub use routes::create_router;
