//! Database repositories
//!
//! Repository pattern implementations for database access.

pub mod post;
pub mod tag;

pub use post::{is_unique_violation, PostRepository, SqlxPostRepository};
pub use tag::{SqlxTagRepository, TagRepository};
