//! Data models
//!
//! This module contains the data structures used throughout the service:
//! - Database entities (Post)
//! - API request types

mod post;

pub use post::{CreatePostInput, Post, UpdatePostInput, MIN_CONTENT_LENGTH};
