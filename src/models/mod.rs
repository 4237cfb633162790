//! Data models
//!
//! Entities stored by DevSpace (posts, tags) and the transient values the
//! slug, content and tag-ranking services produce.

mod content;
mod post;
mod tag;

pub use content::ClassificationResult;
pub use post::{default_excerpt, CreatePostInput, ListParams, NewPost, PagedResult, Post};
pub use tag::{
    normalize_tag_name, RankedTags, SizeBucket, SizedTag, Tag, TagAggregate, TagListing,
};
