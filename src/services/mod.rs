//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories: they
//! validate input and log what changed.

pub mod post;

pub use post::PostService;
