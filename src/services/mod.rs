//! Services layer - Business logic
//!
//! Services are responsible for:
//! - Slug resolution for new posts
//! - Classifying and rendering post content
//! - Ranking tags for the tag listing
//! - Coordinating between repositories and cache

pub mod markdown;
pub mod post;
pub mod slug;
pub mod tag;

pub use markdown::{classify_and_render, ContentClassifier, RENDER_ERROR_HTML};
pub use post::{PostService, PostServiceError};
pub use slug::{generate_slug, generate_unique_slug, generate_unique_slug_with, SlugError};
pub use tag::{most_popular, rank_tags, size_bucket, TagService, TagServiceError};
