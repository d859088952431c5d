//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which service this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRole {
    Gateway,
    Posts,
}

impl FromStr for ServiceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gateway" => Ok(ServiceRole::Gateway),
            "posts" | "post-service" => Ok(ServiceRole::Posts),
            other => Err(format!("unknown service role '{}'", other)),
        }
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceRole::Gateway => f.write_str("gateway"),
            ServiceRole::Posts => f.write_str("posts"),
        }
    }
}

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Role this process plays
    pub role: ServiceRole,
    /// HTTP server port
    pub server_port: u16,
    /// Shared counter store; None runs on the in-process memory store
    pub redis_url: Option<String>,
    /// Memory store budget, applied to cached payloads and to counters separately
    pub max_entries: usize,
    /// Memory store cleanup interval in seconds
    pub cleanup_interval: u64,
    /// TTL of cached listing pages in seconds
    pub listing_ttl: u64,
    /// TTL of cached single posts in seconds
    pub post_ttl: u64,
    /// Largest accepted page size
    pub max_page_size: u32,
    /// Gateway token bucket capacity
    pub gateway_limit: u64,
    /// Seconds for the gateway bucket to refill completely
    pub gateway_period: u64,
    /// Sensitive endpoint requests per window
    pub sensitive_max: u64,
    /// Sensitive endpoint window in seconds
    pub sensitive_window: u64,
    /// Take client IPs from X-Forwarded-For
    pub trust_forwarded_for: bool,
    /// Upstream identity service (gateway role)
    pub identity_service_url: String,
    /// Upstream post service (gateway role)
    pub post_service_url: String,
    /// Bearer tokens accepted by the gateway, as `token:user_id` pairs
    pub gateway_tokens: Vec<(String, String)>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVICE_ROLE` - `gateway` or `posts` (default: posts)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `REDIS_URL` - Shared counter store (default: unset, memory store)
    /// - `MAX_ENTRIES` - Memory store capacity (default: 10000)
    /// - `CLEANUP_INTERVAL` - Memory store sweep in seconds (default: 1)
    /// - `LISTING_TTL` / `POST_TTL` - Cache TTLs in seconds (default: 300 / 3600)
    /// - `MAX_PAGE_SIZE` - Page size cap (default: 100)
    /// - `GATEWAY_LIMIT` / `GATEWAY_PERIOD` - Token bucket (default: 100 per 60s)
    /// - `SENSITIVE_MAX` / `SENSITIVE_WINDOW` - Fixed window (default: 15 per 60s)
    /// - `TRUST_FORWARDED_FOR` - default: true for posts, false for gateway
    /// - `IDENTITY_SERVICE_URL` / `POST_SERVICE_URL` - Upstreams
    /// - `GATEWAY_TOKENS` - Comma separated `token:user_id` pairs
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let role = env_parse("SERVICE_ROLE").unwrap_or(defaults.role);

        Self {
            role,
            server_port: env_parse("SERVER_PORT").unwrap_or(defaults.server_port),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty()),
            max_entries: env_parse("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            cleanup_interval: env_parse("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            listing_ttl: env_parse("LISTING_TTL").unwrap_or(defaults.listing_ttl),
            post_ttl: env_parse("POST_TTL").unwrap_or(defaults.post_ttl),
            max_page_size: env_parse("MAX_PAGE_SIZE").unwrap_or(defaults.max_page_size),
            gateway_limit: env_parse("GATEWAY_LIMIT").unwrap_or(defaults.gateway_limit),
            gateway_period: env_parse("GATEWAY_PERIOD").unwrap_or(defaults.gateway_period),
            sensitive_max: env_parse("SENSITIVE_MAX").unwrap_or(defaults.sensitive_max),
            sensitive_window: env_parse("SENSITIVE_WINDOW").unwrap_or(defaults.sensitive_window),
            trust_forwarded_for: env_parse("TRUST_FORWARDED_FOR")
                .unwrap_or(role == ServiceRole::Posts),
            identity_service_url: env::var("IDENTITY_SERVICE_URL")
                .unwrap_or(defaults.identity_service_url),
            post_service_url: env::var("POST_SERVICE_URL").unwrap_or(defaults.post_service_url),
            gateway_tokens: env::var("GATEWAY_TOKENS")
                .map(|raw| parse_token_pairs(&raw))
                .unwrap_or_default(),
        }
    }

    pub fn listing_ttl(&self) -> Duration {
        Duration::from_secs(self.listing_ttl)
    }

    pub fn post_ttl(&self) -> Duration {
        Duration::from_secs(self.post_ttl)
    }

    pub fn gateway_period(&self) -> Duration {
        Duration::from_secs(self.gateway_period)
    }

    pub fn sensitive_window(&self) -> Duration {
        Duration::from_secs(self.sensitive_window)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            role: ServiceRole::Posts,
            server_port: 3000,
            redis_url: None,
            max_entries: 10_000,
            cleanup_interval: 1,
            listing_ttl: 300,
            post_ttl: 3600,
            max_page_size: 100,
            gateway_limit: 100,
            gateway_period: 60,
            sensitive_max: 15,
            sensitive_window: 60,
            trust_forwarded_for: true,
            identity_service_url: "http://127.0.0.1:3001".to_string(),
            post_service_url: "http://127.0.0.1:3002".to_string(),
            gateway_tokens: Vec::new(),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Parses `tok1:user1,tok2:user2`, skipping malformed pairs.
fn parse_token_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (token, user) = pair.trim().split_once(':')?;
            let (token, user) = (token.trim(), user.trim());
            if token.is_empty() || user.is_empty() {
                None
            } else {
                Some((token.to_string(), user.to_string()))
            }
        })
        .collect()
}
