//! Database repositories
//!
//! Repository pattern implementations for post storage.

pub mod memory;
pub mod post;

pub use memory::InMemoryPostRepository;
pub use post::{PostRepository, SqlxPostRepository};
