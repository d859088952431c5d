//! Request authentication for the post service
//!
//! The gateway verifies credentials and forwards the user id in `x-user-id`.
//! This middleware only requires that header to be present.

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::warn;

use crate::error::{AppError, Result};

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller, available to handlers as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

pub async fn require_user(mut req: Request, next: Next) -> Result<Response> {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    let Some(user_id) = user_id else {
        warn!(path = %req.uri().path(), "Access attempt without user id");
        return Err(AppError::Unauthorized("Auth required".to_string()));
    };

    req.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(req).await)
}
