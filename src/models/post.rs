//! Post model
//!
//! A post is the only entity managed by the service. Storage assigns the id;
//! title, content and the published flag are supplied by callers.

use serde::{Deserialize, Serialize};

/// Content must be strictly longer than this many characters.
///
/// Mirrors the `content_length_check` constraint on the `posts` table.
pub const MIN_CONTENT_LENGTH: usize = 5;

/// A persisted post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub published: bool,
}

impl Post {
    /// Check a record read back from storage.
    ///
    /// Storage constraints should make this unreachable; a failure means the
    /// table holds data the service does not consider a valid post.
    pub fn validate(&self) -> Result<(), String> {
        if self.id <= 0 {
            return Err(format!("Post id must be positive, got {}", self.id));
        }
        validate_fields(&self.title, &self.content)
    }
}

fn default_published() -> bool {
    true
}

/// Input for creating a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    #[serde(default = "default_published")]
    pub published: bool,
}

impl CreatePostInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            published: true,
        }
    }

    pub fn with_published(mut self, published: bool) -> Self {
        self.published = published;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_fields(&self.title, &self.content)
    }
}

/// Input for updating a post.
///
/// Updates replace all mutable fields; the id is taken from the request path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePostInput {
    pub title: String,
    pub content: String,
    #[serde(default = "default_published")]
    pub published: bool,
}

impl UpdatePostInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>, published: bool) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            published,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_fields(&self.title, &self.content)
    }
}

fn validate_fields(title: &str, content: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Title cannot be empty".to_string());
    }
    let length = content.chars().count();
    if length <= MIN_CONTENT_LENGTH {
        return Err(format!(
            "Content must be longer than {} characters (got {})",
            MIN_CONTENT_LENGTH, length
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_input_defaults_to_published() {
        let input: CreatePostInput =
            serde_json::from_str(r#"{"title": "hello", "content": "long enough"}"#).unwrap();
        assert!(input.published);
    }

    #[test]
    fn test_create_input_explicit_unpublished() {
        let input: CreatePostInput = serde_json::from_str(
            r#"{"title": "hello", "content": "long enough", "published": false}"#,
        )
        .unwrap();
        assert!(!input.published);
    }

    #[test]
    fn test_update_input_defaults_to_published() {
        let input: UpdatePostInput =
            serde_json::from_str(r#"{"title": "hello", "content": "long enough"}"#).unwrap();
        assert!(input.published);
    }

    #[test]
    fn test_validate_rejects_blank_title() {
        assert!(CreatePostInput::new("   ", "long enough").validate().is_err());
    }

    #[test]
    fn test_validate_content_threshold() {
        assert!(CreatePostInput::new("t", "12345").validate().is_err());
        assert!(CreatePostInput::new("t", "123456").validate().is_ok());
    }

    #[test]
    fn test_validate_counts_characters_not_bytes() {
        // five characters, fifteen bytes
        assert!(CreatePostInput::new("t", "技术文章好").validate().is_err());
        assert!(CreatePostInput::new("t", "技术文章好的").validate().is_ok());
    }

    #[test]
    fn test_post_validate_rejects_non_positive_id() {
        let post = Post {
            id: 0,
            title: "title".to_string(),
            content: "this content 1".to_string(),
            published: true,
        };
        assert!(post.validate().is_err());
    }

    #[test]
    fn test_post_serialization_shape() {
        let post = Post {
            id: 1,
            title: "this title 1".to_string(),
            content: "this content 1".to_string(),
            published: true,
        };
        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": 1,
                "title": "this title 1",
                "content": "this content 1",
                "published": true
            })
        );
    }
}
