//! Post service
//!
//! Validates input before any connection is borrowed, logs mutations and
//! delegates to the repository. Repository errors pass through unchanged.

use crate::db::repositories::PostRepository;
use crate::db::StoreError;
use crate::models::{CreatePostInput, Post, UpdatePostInput};
use std::sync::Arc;

/// Post service for the posts API
pub struct PostService {
    repo: Arc<dyn PostRepository>,
}

impl PostService {
    /// Create a new post service
    ///
    /// # Arguments
    /// * `repo` - Post repository for database operations
    pub fn new(repo: Arc<dyn PostRepository>) -> Self {
        Self { repo }
    }

    /// List all posts, oldest first
    pub async fn list_posts(&self) -> Result<Vec<Post>, StoreError> {
        let posts = self.repo.list().await?;
        tracing::debug!(count = posts.len(), "Listed posts");
        Ok(posts)
    }

    /// Get the most recently created post
    ///
    /// # Errors
    /// - `NotFound` if there are no posts
    pub async fn get_latest_post(&self) -> Result<Post, StoreError> {
        self.repo.latest().await.map_err(|e| {
            if e.is_not_found() {
                tracing::warn!("No posts to return as latest");
            }
            e
        })
    }

    pub async fn get_post(&self, id: i64) -> Result<Post, StoreError> {
        self.repo.get_by_id(id).await.map_err(|e| {
            if e.is_not_found() {
                tracing::warn!(id, "Post not found");
            }
            e
        })
    }

    /// Create a new post
    ///
    /// # Arguments
    /// * `input` - Title, content and published flag
    ///
    /// # Errors
    /// - `Validation` if the title is blank or the content too short
    /// - `Validation { conflict: true }` if the title is already taken
    pub async fn create_post(&self, input: CreatePostInput) -> Result<Post, StoreError> {
        if let Err(msg) = input.validate() {
            tracing::warn!(error = %msg, "Rejected post creation");
            return Err(StoreError::validation(msg));
        }

        let post = self.repo.create(&input).await?;
        tracing::info!(id = post.id, title = %post.title, "Created post");
        Ok(post)
    }

    /// Replace the title, content and published flag of a post
    ///
    /// # Errors
    /// - `NotFound` if the post does not exist
    /// - `Validation` for invalid input or a title clash
    pub async fn update_post(&self, id: i64, input: UpdatePostInput) -> Result<Post, StoreError> {
        if let Err(msg) = input.validate() {
            tracing::warn!(id, error = %msg, "Rejected post update");
            return Err(StoreError::validation(msg));
        }

        let post = self.repo.update(id, &input).await?;
        tracing::info!(id, "Updated post");
        Ok(post)
    }

    /// Delete a post, returning it as it was
    pub async fn delete_post(&self, id: i64) -> Result<Post, StoreError> {
        let post = self.repo.delete(id).await?;
        tracing::info!(id, "Deleted post");
        Ok(post)
    }
}
