//! Request DTOs for the post service API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

/// Maximum post content length in characters
pub const MAX_CONTENT_LENGTH: usize = 5000;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Request body for POST /api/posts/create-post
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub content: String,
    #[serde(default)]
    pub media_ids: Vec<String>,
}

impl CreatePostRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.content.trim().is_empty() {
            return Some("Content cannot be empty".to_string());
        }
        if self.content.chars().count() > MAX_CONTENT_LENGTH {
            return Some(format!(
                "Content exceeds maximum length of {} characters",
                MAX_CONTENT_LENGTH
            ));
        }
        None
    }
}

/// Query string for GET /api/posts/get-posts
///
/// Kept as raw strings so that junk values fall back to the defaults
/// instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListQuery {
    /// Resolves `(page, limit)`: absent, non-numeric or zero values use the
    /// defaults, and `limit` is capped at `max_page_size`.
    pub fn resolve(&self, max_page_size: u32) -> (u32, u32) {
        let page = parse_positive(self.page.as_deref()).unwrap_or(DEFAULT_PAGE);
        let limit = parse_positive(self.limit.as_deref())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(max_page_size.max(1));
        (page, limit)
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_deserialize() {
        let json = r#"{"content": "hello", "mediaIds": ["m1"]}"#;
        let req: CreatePostRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.content, "hello");
        assert_eq!(req.media_ids, vec!["m1".to_string()]);
    }

    #[test]
    fn test_create_request_media_optional() {
        let req: CreatePostRequest = serde_json::from_str(r#"{"content": "hi"}"#).unwrap();
        assert!(req.media_ids.is_empty());
    }

    #[test]
    fn test_validate_empty_content() {
        let req = CreatePostRequest {
            content: "   ".to_string(),
            media_ids: vec![],
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_too_long() {
        let req = CreatePostRequest {
            content: "x".repeat(MAX_CONTENT_LENGTH + 1),
            media_ids: vec![],
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_resolve_defaults() {
        assert_eq!(ListQuery::default().resolve(100), (1, 10));
    }

    #[test]
    fn test_resolve_junk_and_zero() {
        let query = ListQuery {
            page: Some("abc".to_string()),
            limit: Some("0".to_string()),
        };
        assert_eq!(query.resolve(100), (1, 10));
    }

    #[test]
    fn test_resolve_caps_limit() {
        let query = ListQuery {
            page: Some("3".to_string()),
            limit: Some("5000".to_string()),
        };
        assert_eq!(query.resolve(100), (3, 100));
    }
}
