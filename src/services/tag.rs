//! Tag service
//!
//! Ranking of tag aggregates for the tag listing:
//! - the single most popular tag, with deterministic tie-breaks
//! - a five-step size scale for the tag cloud
//!
//! `TagService` wraps the ranking with storage access and caches the
//! finished listing until the next post is created. Each invalidation bumps
//! a generation counter; a listing computed under an older generation is
//! never left in the cache.

use anyhow::Context;
use std::cmp::Ordering;
use std::sync::atomic::{self, AtomicU64};
use std::sync::Arc;

use crate::cache::MemoryCache;
use crate::db::repositories::{PostRepository, TagRepository};
use crate::models::{
    normalize_tag_name, ListParams, RankedTags, SizeBucket, SizedTag, Tag, TagAggregate,
    TagListing,
};

/// Cache key for the ranked tag listing
const TAG_LISTING_KEY: &str = "tags:listing";

/// Font size of the least used tag in the cloud, in rem
const MIN_FONT_SIZE_REM: f64 = 0.875;
/// Font size of the most used tag in the cloud, in rem
const MAX_FONT_SIZE_REM: f64 = 1.5;

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Whether `current` should replace `best` while folding for the most
/// popular tag
fn beats(current: &TagAggregate, best: &TagAggregate) -> bool {
    if current.post_count != best.post_count {
        return current.post_count > best.post_count;
    }

    match (current.latest_post_date, best.latest_post_date) {
        (Some(c), Some(b)) if c != b => return c > b,
        (Some(_), None) => return true,
        (None, Some(_)) => return false,
        _ => {}
    }

    current.name.to_lowercase() < best.name.to_lowercase()
}

/// The most popular tag: highest post count, then latest post date (a date
/// beats none), then the alphabetically first name ignoring case. On a full
/// tie the earlier tag is kept. `None` for an empty slice.
pub fn most_popular(tags: &[TagAggregate]) -> Option<&TagAggregate> {
    let mut iter = tags.iter();
    let first = iter.next()?;
    Some(iter.fold(first, |best, current| {
        if beats(current, best) {
            current
        } else {
            best
        }
    }))
}

fn ratio(count: i64, max_count: i64) -> f64 {
    if max_count <= 0 {
        0.0
    } else {
        count as f64 / max_count as f64
    }
}

/// Size bucket for a tag with `count` posts when the busiest tag has
/// `max_count`
pub fn size_bucket(count: i64, max_count: i64) -> SizeBucket {
    let ratio = ratio(count, max_count);
    if ratio >= 0.8 {
        SizeBucket::LARGEST
    } else if ratio >= 0.6 {
        SizeBucket::LARGE
    } else if ratio >= 0.4 {
        SizeBucket::MEDIUM
    } else if ratio >= 0.2 {
        SizeBucket::SMALL
    } else {
        SizeBucket::SMALLEST
    }
}

/// Continuous font size for the tag cloud, between 0.875rem and 1.5rem
pub fn font_size_rem(count: i64, max_count: i64) -> f64 {
    MIN_FONT_SIZE_REM + (MAX_FONT_SIZE_REM - MIN_FONT_SIZE_REM) * ratio(count, max_count)
}

/// Rank a tag collection. Tags without posts are dropped first; sized tags
/// come back ordered by post count descending, then name.
pub fn rank_tags(tags: &[TagAggregate]) -> RankedTags {
    let used: Vec<TagAggregate> = tags.iter().filter(|t| t.post_count > 0).cloned().collect();

    let most_popular = most_popular(&used).cloned();
    let max_count = used.iter().map(|t| t.post_count).max().unwrap_or(0);

    let mut sized_tags: Vec<SizedTag> = used
        .into_iter()
        .map(|tag| SizedTag {
            size_bucket: size_bucket(tag.post_count, max_count),
            font_size_rem: font_size_rem(tag.post_count, max_count),
            tag,
        })
        .collect();

    sized_tags.sort_by(|a, b| match b.tag.post_count.cmp(&a.tag.post_count) {
        Ordering::Equal => a.tag.name.cmp(&b.tag.name),
        other => other,
    });

    RankedTags {
        most_popular,
        sized_tags,
    }
}

/// Tag service: tag creation, post association and the cached listing
pub struct TagService {
    repo: Arc<dyn TagRepository>,
    post_repo: Arc<dyn PostRepository>,
    cache: Arc<MemoryCache>,
    generation: AtomicU64,
}

impl TagService {
    pub fn new(
        repo: Arc<dyn TagRepository>,
        post_repo: Arc<dyn PostRepository>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            repo,
            post_repo,
            cache,
            generation: AtomicU64::new(0),
        }
    }

    /// Attach tags to a post by name, creating missing tags. Names are
    /// case-folded; blanks and duplicates are skipped. Returns the attached
    /// tags in input order.
    pub async fn attach_to_post(
        &self,
        post_id: i64,
        names: &[String],
    ) -> Result<Vec<Tag>, TagServiceError> {
        let mut attached: Vec<Tag> = Vec::with_capacity(names.len());

        for name in names.iter().filter_map(|n| normalize_tag_name(n)) {
            if attached.iter().any(|t| t.name == name) {
                continue;
            }
            let tag = self
                .repo
                .get_or_create(&name)
                .await
                .with_context(|| format!("Failed to resolve tag '{}'", name))?;
            self.repo
                .attach_to_post(tag.id, post_id)
                .await
                .context("Failed to attach tag")?;
            attached.push(tag);
        }

        Ok(attached)
    }

    /// Ranked tags plus the published post total, served from cache when
    /// fresh
    pub async fn listing(&self) -> Result<TagListing, TagServiceError> {
        match self.cache.get::<TagListing>(TAG_LISTING_KEY).await {
            Ok(Some(listing)) => return Ok(listing),
            Ok(None) => {}
            Err(e) => tracing::warn!("Discarding unreadable tag listing cache entry: {:#}", e),
        }

        let generation = self.current_generation();
        let aggregates = self
            .repo
            .aggregates()
            .await
            .context("Failed to load tag aggregates")?;
        let total_posts = self
            .post_repo
            .count_published(&ListParams::default())
            .await
            .context("Failed to count published posts")?;

        let listing = TagListing {
            ranked: rank_tags(&aggregates),
            total_posts,
        };

        if self.current_generation() != generation {
            tracing::debug!("Tag listing invalidated while loading, not caching");
            return Ok(listing);
        }

        if let Err(e) = self.cache.set(TAG_LISTING_KEY, &listing).await {
            tracing::warn!("Failed to cache tag listing: {:#}", e);
        }

        // An invalidation between the check above and the write
        if self.current_generation() != generation {
            self.cache.delete(TAG_LISTING_KEY).await;
        }

        Ok(listing)
    }

    /// Drop the cached listing
    pub async fn invalidate(&self) {
        self.generation.fetch_add(1, atomic::Ordering::SeqCst);
        self.cache.delete(TAG_LISTING_KEY).await;
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(atomic::Ordering::SeqCst)
    }
}



#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn aggregate_strategy() -> impl Strategy<Value = TagAggregate> {
        ("[a-zA-Z]{1,8}", 0i64..20, proptest::option::of(1u32..28)).prop_map(|(name, count, day)| {
            TagAggregate::new(
                name,
                count,
                day.map(|d| Utc.with_ymd_and_hms(2024, 2, d, 0, 0, 0).unwrap()),
            )
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn most_popular_has_max_count(tags in proptest::collection::vec(aggregate_strategy(), 0..20)) {
            let ranked = rank_tags(&tags);
            let max = tags.iter().map(|t| t.post_count).max().unwrap_or(0);

            match ranked.most_popular {
                Some(best) => {
                    prop_assert!(best.post_count > 0);
                    prop_assert_eq!(best.post_count, max);
                }
                None => prop_assert_eq!(max, 0),
            }
        }

        #[test]
        fn every_sized_tag_is_used_and_bucketed(tags in proptest::collection::vec(aggregate_strategy(), 0..20)) {
            let ranked = rank_tags(&tags);
            let used = tags.iter().filter(|t| t.post_count > 0).count();

            prop_assert_eq!(ranked.sized_tags.len(), used);
            for sized in &ranked.sized_tags {
                prop_assert!(sized.tag.post_count > 0);
                prop_assert!((1..=5).contains(&sized.size_bucket.get()));
                prop_assert!(sized.font_size_rem >= 0.875 && sized.font_size_rem <= 1.5);
            }
        }

        #[test]
        fn ranking_ignores_zero_count_tags(tags in proptest::collection::vec(aggregate_strategy(), 0..20)) {
            let used: Vec<TagAggregate> = tags.iter().filter(|t| t.post_count > 0).cloned().collect();
            prop_assert_eq!(rank_tags(&tags), rank_tags(&used));
        }
    }
}
