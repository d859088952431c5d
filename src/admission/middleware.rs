//! Admission middleware
//!
//! Mounts one [`AdmissionController`] in front of a router. Stack several
//! layers to check a request against several tiers in order; the first
//! denial ends the request.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{AdmissionController, Decision};

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");

/// Identity used when neither a trusted forwarded header nor the peer
/// address is available.
const UNKNOWN_CLIENT: &str = "unknown";

// == Admission Layer State ==
#[derive(Clone)]
pub struct AdmissionLayer {
    pub controller: Arc<AdmissionController>,
    /// Take the client IP from `X-Forwarded-For` (set by a fronting proxy)
    pub trust_forwarded_for: bool,
}

impl AdmissionLayer {
    pub fn new(controller: Arc<AdmissionController>, trust_forwarded_for: bool) -> Self {
        Self {
            controller,
            trust_forwarded_for,
        }
    }
}

/// Resolves the client IP a request is accounted to.
///
/// With `trust_forwarded_for` set, the rightmost `X-Forwarded-For` hop wins:
/// it is the one the fronting proxy appended, while anything to its left came
/// from the client.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get_all("x-forwarded-for")
            .iter()
            .last()
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next_back())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

pub fn peer_addr(req: &Request) -> Option<SocketAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Middleware body for `axum::middleware::from_fn_with_state`.
pub async fn enforce(State(layer): State<AdmissionLayer>, req: Request, next: Next) -> Response {
    let identity = client_ip(req.headers(), peer_addr(&req), layer.trust_forwarded_for);
    let controller = &layer.controller;

    let remaining = match controller.check(&identity).await {
        Ok(Decision::Allowed { remaining }) => remaining,
        Ok(Decision::Denied { retry_after }) => {
            let mut response = controller.rejection(retry_after).into_response();
            set_limit_headers(response.headers_mut(), controller.limit(), 0);
            return response;
        }
        Err(err) => return err.into_response(),
    };

    let mut response = next.run(req).await;
    set_limit_headers(response.headers_mut(), controller.limit(), remaining);
    response
}

fn set_limit_headers(headers: &mut HeaderMap, limit: u64, remaining: u64) {
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(remaining));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_prefers_trusted_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer), true), "10.0.0.1");
        assert_eq!(client_ip(&headers, Some(peer), false), "10.0.0.9");
    }

    #[test]
    fn test_client_ip_ignores_client_supplied_hops() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.1.1.1, 2.2.2.2"));
        headers.append("x-forwarded-for", HeaderValue::from_static("6.6.6.6, 198.51.100.9"));
        let peer: SocketAddr = "10.0.0.2:5000".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer), true), "198.51.100.9");
    }

    #[test]
    fn test_client_ip_without_peer() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, None, true), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_client_ip_ignores_empty_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" "));
        let peer: SocketAddr = "192.0.2.4:80".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer), true), "192.0.2.4");
    }
}
