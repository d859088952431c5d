//! Error types for the services
//!
//! Provides unified error handling using thiserror. Every variant maps to an
//! HTTP status and the `{ "success": false, "message": ... }` rejection body.

use std::time::Duration;

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

// == App Error Enum ==
/// Unified error type for the gateway and the post service.
#[derive(Error, Debug)]
pub enum AppError {
    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or rejected credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// An admission tier denied the request
    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after: Duration,
    },

    /// Cache store failed and the cache is configured to fail closed
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Counter store failed and the limiter is configured to fail closed
    #[error("Admission store unavailable: {0}")]
    AdmissionUnavailable(String),

    /// Record store failed
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    /// Proxy could not reach the upstream service
    #[error("Upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::CacheUnavailable(_) | AppError::AdmissionUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::StoreUnavailable(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Client-facing message. Store and upstream details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::NotFound(msg)
            | AppError::InvalidRequest(msg)
            | AppError::Unauthorized(msg) => msg.clone(),
            AppError::RateLimited { message, .. } => message.clone(),
            AppError::CacheUnavailable(_) => "Cache unavailable".to_string(),
            AppError::AdmissionUnavailable(_) => "Rate limiter unavailable".to_string(),
            AppError::StoreUnavailable(_) | AppError::Internal(_) => {
                "Internal Server Error".to_string()
            }
            AppError::UpstreamUnreachable(_) => "Bad Gateway".to_string(),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::StoreUnavailable(detail) | AppError::Internal(detail) = &self {
            error!(status = status.as_u16(), error = %detail, "Request failed");
        }
        let body = Json(ErrorResponse::new(self.public_message()));
        let mut response = (status, body).into_response();

        if let AppError::RateLimited { retry_after, .. } = &self {
            let secs = retry_after_secs(*retry_after);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

/// A body that is not the expected JSON document is the client's fault,
/// whatever stage of extraction rejected it.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Rounds a wait up to whole seconds, never below one.
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

// == Result Type Alias ==
/// Convenience Result type for the services.
pub type Result<T> = std::result::Result<T, AppError>;
