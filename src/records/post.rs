use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A post as stored and as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub content: String,
    #[serde(default)]
    pub media_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Creates a post with a fresh id, timestamped now.
    pub fn new(
        author_id: impl Into<String>,
        content: impl Into<String>,
        media_ids: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author_id: author_id.into(),
            content: content.into(),
            media_ids,
            created_at: Utc::now(),
        }
    }

    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.author_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_post_has_unique_id() {
        let a = Post::new("u1", "hello", vec![]);
        let b = Post::new("u1", "hello", vec![]);
        assert_ne!(a.id, b.id);
        assert!(a.is_authored_by("u1"));
        assert!(!a.is_authored_by("u2"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let post = Post::new("u1", "hello", vec!["m1".to_string()]);
        let json = serde_json::to_value(&post).unwrap();

        assert_eq!(json["authorId"], "u1");
        assert_eq!(json["mediaIds"][0], "m1");
        assert!(json.get("createdAt").is_some());
    }
}
