//! Tag models
//!
//! Tag names are case-folded on write. Counts and latest-post dates are
//! aggregates computed on read from published posts; they are never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    /// Unique identifier
    pub id: i64,
    /// Case-folded tag name
    pub name: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Fold a user-supplied tag name into its stored form
///
/// Returns `None` for names that are blank after trimming.
pub fn normalize_tag_name(name: &str) -> Option<String> {
    let folded = name.trim().to_lowercase();
    if folded.is_empty() {
        None
    } else {
        Some(folded)
    }
}

/// A tag together with its derived post count and most recent post date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagAggregate {
    pub name: String,
    pub post_count: i64,
    pub latest_post_date: Option<DateTime<Utc>>,
}

impl TagAggregate {
    pub fn new(
        name: impl Into<String>,
        post_count: i64,
        latest_post_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            name: name.into(),
            post_count,
            latest_post_date,
        }
    }
}

/// Discrete display-size tier for the tag cloud, 1 (smallest) to 5 (largest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub struct SizeBucket(u8);

impl SizeBucket {
    pub const SMALLEST: SizeBucket = SizeBucket(1);
    pub const SMALL: SizeBucket = SizeBucket(2);
    pub const MEDIUM: SizeBucket = SizeBucket(3);
    pub const LARGE: SizeBucket = SizeBucket(4);
    pub const LARGEST: SizeBucket = SizeBucket(5);

    pub fn get(self) -> u8 {
        self.0
    }
}

impl From<SizeBucket> for u8 {
    fn from(bucket: SizeBucket) -> Self {
        bucket.0
    }
}

impl TryFrom<u8> for SizeBucket {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=5).contains(&value) {
            Ok(SizeBucket(value))
        } else {
            Err(format!("size bucket must be between 1 and 5, got {}", value))
        }
    }
}

/// A tag positioned in the tag cloud
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SizedTag {
    #[serde(flatten)]
    pub tag: TagAggregate,
    pub size_bucket: SizeBucket,
    /// Continuous font size between 0.875rem and 1.5rem
    pub font_size_rem: f64,
}

/// Result of ranking a tag collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RankedTags {
    pub most_popular: Option<TagAggregate>,
    pub sized_tags: Vec<SizedTag>,
}

/// Ranked tags plus the published post total, as served by the tag listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TagListing {
    #[serde(flatten)]
    pub ranked: RankedTags,
    pub total_posts: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tag_name() {
        assert_eq!(normalize_tag_name("  Rust "), Some("rust".to_string()));
        assert_eq!(normalize_tag_name("프론트엔드"), Some("프론트엔드".to_string()));
        assert_eq!(normalize_tag_name("   "), None);
    }

    #[test]
    fn test_size_bucket_bounds() {
        assert!(SizeBucket::try_from(0).is_err());
        assert!(SizeBucket::try_from(6).is_err());
        assert_eq!(SizeBucket::try_from(5).unwrap(), SizeBucket::LARGEST);
        assert!(SizeBucket::SMALLEST < SizeBucket::LARGEST);
    }

    #[test]
    fn test_sized_tag_serializes_flat() {
        let sized = SizedTag {
            tag: TagAggregate::new("rust", 3, None),
            size_bucket: SizeBucket::MEDIUM,
            font_size_rem: 1.0,
        };
        let json = serde_json::to_value(&sized).unwrap();
        assert_eq!(json["name"], "rust");
        assert_eq!(json["post_count"], 3);
        assert_eq!(json["size_bucket"], 3);
        assert!(json["latest_post_date"].is_null());
    }
}
