//! Reverse proxy
//!
//! Rewrites `/v1/...` to `/api/...`, forwards to the upstream service and
//! relays the response. Authenticated routes get `x-user-id` injected from the
//! verified bearer token; a client-supplied `x-user-id` never passes through.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::Response,
};
use tracing::{error, info, warn};

use super::credentials::{bearer_token, CredentialService};
use crate::admission::{client_ip, peer_addr};
use crate::api::USER_ID_HEADER;
use crate::error::{AppError, Result};

/// Largest request body the gateway buffers
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers that describe one connection and are not forwarded.
const HOP_BY_HOP: [HeaderName; 5] = [
    header::CONNECTION,
    header::HOST,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Application state shared across the gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub client: reqwest::Client,
    pub identity_url: String,
    pub post_url: String,
    pub credentials: Arc<dyn CredentialService>,
    pub trust_forwarded_for: bool,
}

impl GatewayState {
    pub fn new(
        identity_url: impl Into<String>,
        post_url: impl Into<String>,
        credentials: Arc<dyn CredentialService>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            identity_url: identity_url.into(),
            post_url: post_url.into(),
            credentials,
            trust_forwarded_for: false,
        }
    }

    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}

/// Maps a gateway path onto the service path: a leading `/v1` becomes `/api`.
pub fn rewrite_path(path_and_query: &str) -> String {
    match path_and_query.strip_prefix("/v1") {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') => {
            format!("/api{}", rest)
        }
        _ => path_and_query.to_string(),
    }
}

/// Handler for `/v1/auth/*`. No credentials needed.
pub async fn proxy_identity(State(state): State<GatewayState>, req: Request) -> Result<Response> {
    let upstream = state.identity_url.clone();
    forward(&state, &upstream, "identity", req, None).await
}

/// Handler for `/v1/posts` and `/v1/posts/*`. Requires a valid bearer token.
pub async fn proxy_posts(State(state): State<GatewayState>, req: Request) -> Result<Response> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string);

    let Some(token) = token else {
        warn!("Access attempt without valid token");
        return Err(AppError::Unauthorized("Authentication required".to_string()));
    };

    let Some(user_id) = state.credentials.verify(&token).await else {
        warn!("Invalid token");
        return Err(AppError::Unauthorized("Invalid token".to_string()));
    };

    let upstream = state.post_url.clone();
    forward(&state, &upstream, "posts", req, Some(&user_id)).await
}

async fn forward(
    state: &GatewayState,
    upstream: &str,
    service: &'static str,
    req: Request,
    user_id: Option<&str>,
) -> Result<Response> {
    let client = client_ip(req.headers(), peer_addr(&req), state.trust_forwarded_for);
    let (parts, body) = req.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = format!("{}{}", upstream.trim_end_matches('/'), rewrite_path(path_and_query));

    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|err| AppError::InvalidRequest(format!("Unreadable request body: {}", err)))?;

    let headers = upstream_headers(&parts.headers, &client, user_id)?;

    let upstream_response = state
        .client
        .request(parts.method, &target)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|err| {
            error!(service, target = %target, error = %err, "Proxy error");
            AppError::UpstreamUnreachable(err.to_string())
        })?;

    let status = upstream_response.status();
    info!(service, status = status.as_u16(), "Response from upstream");

    let response_headers = upstream_response.headers().clone();
    let bytes = upstream_response.bytes().await.map_err(|err| {
        error!(service, error = %err, "Upstream response body failed");
        AppError::UpstreamUnreachable(err.to_string())
    })?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    for (name, value) in response_headers.iter() {
        if !HOP_BY_HOP.contains(name) {
            response.headers_mut().append(name.clone(), value.clone());
        }
    }
    Ok(response)
}

/// Builds the header set sent upstream.
fn upstream_headers(incoming: &HeaderMap, client: &str, user_id: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(incoming.len() + 2);
    for (name, value) in incoming.iter() {
        if HOP_BY_HOP.contains(name) || name.as_str() == USER_ID_HEADER {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

    // Any chain the client sent is replaced by the address resolved here
    headers.insert(
        X_FORWARDED_FOR,
        HeaderValue::from_str(client)
            .map_err(|err| AppError::InvalidRequest(format!("Bad forwarding header: {}", err)))?,
    );

    if let Some(user_id) = user_id {
        headers.insert(
            USER_ID_HEADER,
            HeaderValue::from_str(user_id)
                .map_err(|err| AppError::Internal(format!("Unusable user id: {}", err)))?,
        );
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_path() {
        assert_eq!(rewrite_path("/v1/posts/get-posts?page=2"), "/api/posts/get-posts?page=2");
        assert_eq!(rewrite_path("/v1/auth/login"), "/api/auth/login");
        assert_eq!(rewrite_path("/v1"), "/api");
    }

    #[test]
    fn test_rewrite_path_leaves_other_prefixes() {
        assert_eq!(rewrite_path("/v10/posts"), "/v10/posts");
        assert_eq!(rewrite_path("/health"), "/health");
    }

    #[test]
    fn test_upstream_headers_replace_user_id() {
        let mut incoming = HeaderMap::new();
        incoming.insert(USER_ID_HEADER, HeaderValue::from_static("spoofed"));
        incoming.insert(header::HOST, HeaderValue::from_static("gateway.local"));
        incoming.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));

        let headers = upstream_headers(&incoming, "198.51.100.2", Some("user-1")).unwrap();

        assert_eq!(headers[USER_ID_HEADER], "user-1");
        assert_eq!(headers.get_all(USER_ID_HEADER).iter().count(), 1);
        assert!(headers.get(header::HOST).is_none());
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers[X_FORWARDED_FOR], "198.51.100.2");
        assert_eq!(headers[header::AUTHORIZATION], "Bearer t");
    }

    #[test]
    fn test_upstream_headers_strip_user_id_on_public_routes() {
        let mut incoming = HeaderMap::new();
        incoming.insert(USER_ID_HEADER, HeaderValue::from_static("spoofed"));

        let headers = upstream_headers(&incoming, "10.0.0.5", None).unwrap();

        assert!(headers.get(USER_ID_HEADER).is_none());
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.5");
    }

    #[test]
    fn test_upstream_headers_replace_client_forwarded_chain() {
        let mut incoming = HeaderMap::new();
        incoming.insert(X_FORWARDED_FOR, HeaderValue::from_static("1.2.3.4, 5.6.7.8"));
        incoming.append(X_FORWARDED_FOR, HeaderValue::from_static("9.9.9.9"));

        let headers = upstream_headers(&incoming, "198.51.100.7", Some("user-1")).unwrap();

        assert_eq!(headers.get_all(X_FORWARDED_FOR).iter().count(), 1);
        assert_eq!(headers[X_FORWARDED_FOR], "198.51.100.7");
    }
}
