//! Post service
//!
//! Creation and lookup of posts. Creating a post resolves a unique slug from
//! the title, inserts the row and attaches tags. The slug check and the
//! insert are separate round-trips, so a concurrent writer can take the
//! slug in between; the unique index on `posts.slug` turns that into a
//! conflict which is retried with exponential backoff. If attaching tags
//! fails the inserted post is deleted again.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ContentConfig, SlugConfig};
use crate::db::repositories::{is_unique_violation, PostRepository};
use crate::models::{default_excerpt, CreatePostInput, ListParams, NewPost, PagedResult, Post};
use crate::services::slug::{generate_unique_slug_with, SlugError};
use crate::services::tag::{TagService, TagServiceError};

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The title yields no usable slug
    #[error("Invalid title: {0}")]
    InvalidTitle(String),

    /// No free slug could be claimed
    #[error("Slug conflict: {0}")]
    SlugConflict(String),

    /// Post not found
    #[error("Post not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<SlugError> for PostServiceError {
    fn from(err: SlugError) -> Self {
        match err {
            SlugError::InvalidTitle(_) => PostServiceError::InvalidTitle(err.to_string()),
            SlugError::Exhausted { .. } => PostServiceError::SlugConflict(err.to_string()),
            SlugError::Lookup(e) => PostServiceError::InternalError(e),
        }
    }
}

impl From<TagServiceError> for PostServiceError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::InternalError(e) => PostServiceError::InternalError(e),
        }
    }
}

/// Post service
pub struct PostService {
    repo: Arc<dyn PostRepository>,
    tags: Arc<TagService>,
    slug_config: SlugConfig,
    content_config: ContentConfig,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        tags: Arc<TagService>,
        slug_config: SlugConfig,
        content_config: ContentConfig,
    ) -> Self {
        Self {
            repo,
            tags,
            slug_config,
            content_config,
        }
    }

    /// Create a post
    ///
    /// A missing or blank excerpt defaults to the first `excerpt_length`
    /// characters of the content followed by `...`.
    ///
    /// # Errors
    /// - `ValidationError` if title or content is blank
    /// - `InvalidTitle` if the title has no slug-safe characters
    /// - `SlugConflict` if no slug could be claimed within the limits
    pub async fn create(&self, input: CreatePostInput) -> Result<Post, PostServiceError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(PostServiceError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }
        if input.content.trim().is_empty() {
            return Err(PostServiceError::ValidationError(
                "Content cannot be empty".to_string(),
            ));
        }

        let excerpt = match input.excerpt.as_deref().map(str::trim) {
            Some(excerpt) if !excerpt.is_empty() => excerpt.to_string(),
            _ => default_excerpt(&input.content, self.content_config.excerpt_length),
        };

        let mut post = self
            .insert_with_unique_slug(title, &input.content, &excerpt, input.published)
            .await?;

        let attached = match self.tags.attach_to_post(post.id, &input.tags).await {
            Ok(attached) => attached,
            Err(e) => {
                self.discard(&post).await;
                return Err(e.into());
            }
        };

        let mut tag_names: Vec<String> = attached.into_iter().map(|tag| tag.name).collect();
        tag_names.sort();
        post.tags = tag_names;

        self.tags.invalidate().await;

        tracing::info!(slug = %post.slug, published = post.published, "Post created");
        Ok(post)
    }

    async fn insert_with_unique_slug(
        &self,
        title: &str,
        content: &str,
        excerpt: &str,
        published: bool,
    ) -> Result<Post, PostServiceError> {
        let max_retries = self.slug_config.max_insert_retries;
        let mut attempt: u32 = 0;

        loop {
            let repo = Arc::clone(&self.repo);
            let slug = generate_unique_slug_with(title, &self.slug_config, move |candidate| {
                let repo = Arc::clone(&repo);
                async move { repo.exists_by_slug(&candidate).await }
            })
            .await?;

            let new_post = NewPost {
                title: title.to_string(),
                slug,
                content: content.to_string(),
                excerpt: excerpt.to_string(),
                published,
            };

            match self.repo.create(&new_post).await {
                Ok(post) => return Ok(post),
                Err(e) if is_unique_violation(&e) => {
                    if attempt >= max_retries {
                        return Err(PostServiceError::SlugConflict(format!(
                            "slug '{}' was taken concurrently {} times",
                            new_post.slug,
                            attempt + 1
                        )));
                    }
                    let backoff = self.backoff(attempt);
                    tracing::warn!(
                        slug = %new_post.slug,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        "Slug taken between check and insert, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.context("Failed to insert post").into()),
            }
        }
    }

    /// Remove a post whose tags could not be attached, so a failed create
    /// leaves nothing behind
    async fn discard(&self, post: &Post) {
        match self.repo.delete(post.id).await {
            Ok(()) => tracing::warn!(slug = %post.slug, "Rolled back post after tag failure"),
            Err(e) => tracing::error!(
                slug = %post.slug,
                "Failed to roll back post after tag failure: {:#}",
                e
            ),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.slug_config.base_backoff_ms.saturating_mul(factor))
    }

    /// Get a published post by slug
    ///
    /// # Errors
    /// - `NotFound` if no published post has this slug
    pub async fn get_by_slug(&self, slug: &str) -> Result<Post, PostServiceError> {
        let post = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get post by slug")?;

        match post {
            Some(post) if post.published => Ok(post),
            _ => Err(PostServiceError::NotFound(slug.to_string())),
        }
    }

    /// Published posts, newest first
    pub async fn list_published(
        &self,
        params: &ListParams,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let items = self
            .repo
            .list_published(params)
            .await
            .context("Failed to list published posts")?;
        let total = self
            .repo
            .count_published(params)
            .await
            .context("Failed to count published posts")?;

        Ok(PagedResult::new(items, total, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{SqlxPostRepository, SqlxTagRepository, TagRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{Tag, TagAggregate};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn fast_slug_config() -> SlugConfig {
        SlugConfig {
            base_backoff_ms: 1,
            ..SlugConfig::default()
        }
    }

    async fn setup_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    fn service_with(repo: Arc<dyn PostRepository>, tag_repo: Arc<dyn TagRepository>) -> PostService {
        let tags = Arc::new(TagService::new(
            tag_repo,
            repo.clone(),
            Arc::new(MemoryCache::new(10, Duration::from_secs(60))),
        ));
        PostService::new(repo, tags, fast_slug_config(), ContentConfig::default())
    }

    fn service_with_repo(pool: &DynDatabasePool, repo: Arc<dyn PostRepository>) -> PostService {
        service_with(repo, SqlxTagRepository::boxed(pool.clone()))
    }

    async fn setup_service() -> PostService {
        let pool = setup_pool().await;
        let repo = SqlxPostRepository::boxed(pool.clone());
        service_with_repo(&pool, repo)
    }

    /// Inserts a rival post with the same slug right before the first insert
    struct RacingRepo {
        inner: SqlxPostRepository,
        raced: AtomicBool,
    }

    #[async_trait]
    impl PostRepository for RacingRepo {
        async fn create(&self, post: &NewPost) -> anyhow::Result<Post> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let rival = NewPost {
                    title: "rival".to_string(),
                    ..post.clone()
                };
                self.inner.create(&rival).await?;
            }
            self.inner.create(post).await
        }

        async fn exists_by_slug(&self, slug: &str) -> anyhow::Result<bool> {
            self.inner.exists_by_slug(slug).await
        }

        async fn get_by_slug(&self, slug: &str) -> anyhow::Result<Option<Post>> {
            self.inner.get_by_slug(slug).await
        }

        async fn list_published(&self, params: &ListParams) -> anyhow::Result<Vec<Post>> {
            self.inner.list_published(params).await
        }

        async fn count_published(&self, params: &ListParams) -> anyhow::Result<i64> {
            self.inner.count_published(params).await
        }

        async fn delete(&self, id: i64) -> anyhow::Result<()> {
            self.inner.delete(id).await
        }
    }

    /// Never reports a slug as taken, so every insert of a used slug conflicts
    struct BlindRepo {
        inner: SqlxPostRepository,
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl PostRepository for BlindRepo {
        async fn create(&self, post: &NewPost) -> anyhow::Result<Post> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.inner.create(post).await
        }

        async fn exists_by_slug(&self, _slug: &str) -> anyhow::Result<bool> {
            Ok(false)
        }

        async fn get_by_slug(&self, slug: &str) -> anyhow::Result<Option<Post>> {
            self.inner.get_by_slug(slug).await
        }

        async fn list_published(&self, params: &ListParams) -> anyhow::Result<Vec<Post>> {
            self.inner.list_published(params).await
        }

        async fn count_published(&self, params: &ListParams) -> anyhow::Result<i64> {
            self.inner.count_published(params).await
        }

        async fn delete(&self, id: i64) -> anyhow::Result<()> {
            self.inner.delete(id).await
        }
    }

    /// Tag storage that is down
    struct BrokenTagRepo;

    #[async_trait]
    impl TagRepository for BrokenTagRepo {
        async fn get_or_create(&self, _name: &str) -> anyhow::Result<Tag> {
            Err(anyhow::anyhow!("tag storage unavailable"))
        }

        async fn get_by_name(&self, _name: &str) -> anyhow::Result<Option<Tag>> {
            Ok(None)
        }

        async fn attach_to_post(&self, _tag_id: i64, _post_id: i64) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("tag storage unavailable"))
        }

        async fn aggregates(&self) -> anyhow::Result<Vec<TagAggregate>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_create_post() {
        let service = setup_service().await;

        let post = service
            .create(
                CreatePostInput::new("Hello World", "Some **content**")
                    .published()
                    .with_tags(["Rust", "web", "rust"]),
            )
            .await
            .expect("Failed to create post");

        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.excerpt, "Some **content**...");
        assert_eq!(post.tags, vec!["rust", "web"]);
    }

    #[tokio::test]
    async fn test_same_title_gets_suffix() {
        let service = setup_service().await;

        let first = service.create(CreatePostInput::new("Same", "a")).await.unwrap();
        let second = service.create(CreatePostInput::new("Same", "b")).await.unwrap();
        let third = service.create(CreatePostInput::new("same!", "c")).await.unwrap();

        assert_eq!(first.slug, "same");
        assert_eq!(second.slug, "same-1");
        assert_eq!(third.slug, "same-2");
    }

    #[tokio::test]
    async fn test_explicit_excerpt_kept() {
        let service = setup_service().await;
        let post = service
            .create(CreatePostInput::new("T", "long content").with_excerpt("  short  "))
            .await
            .unwrap();
        assert_eq!(post.excerpt, "short");
    }

    #[tokio::test]
    async fn test_default_excerpt_truncates() {
        let service = setup_service().await;
        let content = "가".repeat(250);
        let post = service.create(CreatePostInput::new("Long", content)).await.unwrap();
        assert_eq!(post.excerpt, format!("{}...", "가".repeat(200)));
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let service = setup_service().await;

        let err = service.create(CreatePostInput::new("  ", "body")).await.unwrap_err();
        assert!(matches!(err, PostServiceError::ValidationError(_)));

        let err = service.create(CreatePostInput::new("Title", " \n ")).await.unwrap_err();
        assert!(matches!(err, PostServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_unsluggable_title_rejected() {
        let service = setup_service().await;
        let err = service.create(CreatePostInput::new("!!!", "body")).await.unwrap_err();
        assert!(matches!(err, PostServiceError::InvalidTitle(_)));
    }

    #[tokio::test]
    async fn test_lost_race_retries_with_next_suffix() {
        let pool = setup_pool().await;
        let repo: Arc<dyn PostRepository> = Arc::new(RacingRepo {
            inner: SqlxPostRepository::new(pool.clone()),
            raced: AtomicBool::new(false),
        });
        let service = service_with_repo(&pool, repo);

        let post = service
            .create(CreatePostInput::new("Contested", "body").published())
            .await
            .expect("Retry should resolve the conflict");

        assert_eq!(post.slug, "contested-1");
    }

    #[tokio::test]
    async fn test_persistent_conflict_gives_up() {
        let pool = setup_pool().await;
        let blind = Arc::new(BlindRepo {
            inner: SqlxPostRepository::new(pool.clone()),
            inserts: AtomicUsize::new(0),
        });
        let service = service_with_repo(&pool, blind.clone());

        service.create(CreatePostInput::new("Dup", "a")).await.unwrap();
        let err = service.create(CreatePostInput::new("Dup", "b")).await.unwrap_err();

        assert!(matches!(err, PostServiceError::SlugConflict(_)));
        // One successful insert, then the first try plus three retries
        assert_eq!(blind.inserts.load(Ordering::SeqCst), 1 + 4);
    }

    #[tokio::test]
    async fn test_tag_failure_leaves_no_post() {
        let pool = setup_pool().await;
        let repo = SqlxPostRepository::boxed(pool.clone());
        let broken = service_with(repo.clone(), Arc::new(BrokenTagRepo));

        let err = broken
            .create(CreatePostInput::new("Atomic", "body").published().with_tags(["rust"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PostServiceError::InternalError(_)));
        assert!(!repo.exists_by_slug("atomic").await.unwrap());

        // Retrying once tags work again reuses the slug
        let working = service_with_repo(&pool, repo);
        let post = working
            .create(CreatePostInput::new("Atomic", "body").published().with_tags(["rust"]))
            .await
            .expect("Retry should succeed");
        assert_eq!(post.slug, "atomic");
        assert_eq!(post.tags, vec!["rust"]);
    }

    #[tokio::test]
    async fn test_untagged_post_unaffected_by_tag_storage() {
        let pool = setup_pool().await;
        let repo = SqlxPostRepository::boxed(pool.clone());
        let service = service_with(repo.clone(), Arc::new(BrokenTagRepo));

        let post = service
            .create(CreatePostInput::new("Plain", "body").published())
            .await
            .expect("No tags to attach");
        assert_eq!(post.slug, "plain");
        assert!(repo.exists_by_slug("plain").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_by_slug_hides_drafts() {
        let service = setup_service().await;
        service.create(CreatePostInput::new("Visible", "a").published()).await.unwrap();
        service.create(CreatePostInput::new("Hidden", "b")).await.unwrap();

        assert_eq!(service.get_by_slug("visible").await.unwrap().title, "Visible");
        assert!(matches!(
            service.get_by_slug("hidden").await,
            Err(PostServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.get_by_slug("missing").await,
            Err(PostServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_published_paged() {
        let service = setup_service().await;
        for i in 0..3 {
            service
                .create(CreatePostInput::new(format!("Post {}", i), "body").published())
                .await
                .unwrap();
        }
        service.create(CreatePostInput::new("Draft", "body")).await.unwrap();

        let page = service.list_published(&ListParams::new(1, 2)).await.unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages(), 2);
        assert_eq!(page.items[0].slug, "post-2");
    }

    #[tokio::test]
    async fn test_backoff_doubles() {
        let pool = setup_pool().await;
        let repo = SqlxPostRepository::boxed(pool.clone());
        let tags = Arc::new(TagService::new(
            SqlxTagRepository::boxed(pool.clone()),
            repo.clone(),
            Arc::new(MemoryCache::new(10, Duration::from_secs(60))),
        ));
        let service = PostService::new(repo, tags, SlugConfig::default(), ContentConfig::default());

        assert_eq!(service.backoff(0), Duration::from_millis(10));
        assert_eq!(service.backoff(1), Duration::from_millis(20));
        assert_eq!(service.backoff(3), Duration::from_millis(80));
        assert_eq!(service.backoff(200), Duration::from_millis(u64::MAX));
    }
}
