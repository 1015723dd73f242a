//! In-memory post repository
//!
//! Holds posts behind an async `RwLock` and applies the same rules the
//! `posts` table enforces: unique titles, the content length check, and ids
//! that only ever grow.

use super::post::PostRepository;
use crate::db::StoreError;
use crate::models::{CreatePostInput, Post, UpdatePostInput};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryStore {
    /// Kept sorted by id
    posts: Vec<Post>,
    last_id: i64,
}

impl MemoryStore {
    fn position(&self, id: i64) -> Option<usize> {
        self.posts.binary_search_by_key(&id, |p| p.id).ok()
    }

    fn check_title(&self, title: &str, except: Option<i64>) -> Result<(), StoreError> {
        let taken = self
            .posts
            .iter()
            .any(|p| p.title == title && Some(p.id) != except);
        if taken {
            return Err(StoreError::Validation {
                message: "A post with this title already exists".to_string(),
                conflict: true,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPostRepository {
    store: RwLock<MemoryStore>,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store. Ids continue after the largest seeded id.
    pub fn with_posts(mut posts: Vec<Post>) -> Self {
        posts.sort_by_key(|p| p.id);
        let last_id = posts.last().map_or(0, |p| p.id);
        Self {
            store: RwLock::new(MemoryStore { posts, last_id }),
        }
    }

    pub fn boxed() -> Arc<dyn PostRepository> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn list(&self) -> Result<Vec<Post>, StoreError> {
        Ok(self.store.read().await.posts.clone())
    }

    async fn latest(&self) -> Result<Post, StoreError> {
        self.store
            .read()
            .await
            .posts
            .last()
            .cloned()
            .ok_or_else(|| StoreError::NotFound("No posts found".to_string()))
    }

    async fn get_by_id(&self, id: i64) -> Result<Post, StoreError> {
        let store = self.store.read().await;
        store
            .position(id)
            .map(|idx| store.posts[idx].clone())
            .ok_or_else(|| StoreError::post_not_found(id))
    }

    async fn create(&self, input: &CreatePostInput) -> Result<Post, StoreError> {
        input.validate().map_err(StoreError::validation)?;
        let mut store = self.store.write().await;
        store.check_title(&input.title, None)?;

        store.last_id += 1;
        let post = Post {
            id: store.last_id,
            title: input.title.clone(),
            content: input.content.clone(),
            published: input.published,
        };
        store.posts.push(post.clone());
        Ok(post)
    }

    async fn update(&self, id: i64, input: &UpdatePostInput) -> Result<Post, StoreError> {
        input.validate().map_err(StoreError::validation)?;
        let mut store = self.store.write().await;
        let idx = store
            .position(id)
            .ok_or_else(|| StoreError::post_not_found(id))?;
        store.check_title(&input.title, Some(id))?;

        let post = &mut store.posts[idx];
        post.title = input.title.clone();
        post.content = input.content.clone();
        post.published = input.published;
        Ok(post.clone())
    }

    async fn delete(&self, id: i64) -> Result<Post, StoreError> {
        let mut store = self.store.write().await;
        let idx = store
            .position(id)
            .ok_or_else(|| StoreError::post_not_found(id))?;
        Ok(store.posts.remove(idx))
    }
}
