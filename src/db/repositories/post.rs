//! Post repository
//!
//! Database operations for posts.
//!
//! This module provides:
//! - `PostRepository` trait defining the interface for post data access
//! - `SqlxPostRepository` implementing the trait for SQLite and MySQL
//! - `is_unique_violation` to recognise a lost slug race

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use crate::db::{Backend, DynDatabasePool};
use crate::models::{ListParams, NewPost, Post};

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post. Fails with a unique violation if the slug is taken,
    /// see [`is_unique_violation`].
    async fn create(&self, post: &NewPost) -> Result<Post>;

    /// Whether any post, published or not, uses this slug
    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;

    /// Get post by slug, with its tag names
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    /// Published posts matching the filters, newest first, with tag names
    async fn list_published(&self, params: &ListParams) -> Result<Vec<Post>>;

    /// Number of published posts matching the filters
    async fn count_published(&self, params: &ListParams) -> Result<i64>;

    /// Delete a post. Its tag links go with it (ON DELETE CASCADE).
    async fn delete(&self, id: i64) -> Result<()>;
}

/// Whether `err` was caused by a unique constraint violation
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| match cause.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    })
}

/// SQLx-based post repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    /// Create a new SQLx post repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_POST: &str = r#"
    INSERT INTO posts (title, slug, content, excerpt, published, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

const SELECT_BY_SLUG: &str = r#"
    SELECT id, title, slug, content, excerpt, published, created_at, updated_at
    FROM posts
    WHERE slug = ?
"#;

const SELECT_TAG_NAMES: &str = r#"
    SELECT t.name
    FROM tags t
    INNER JOIN post_tags pt ON pt.tag_id = t.id
    WHERE pt.post_id = ?
    ORDER BY t.name
"#;

// Filter placeholders, in bind order: tag, tag, search, pattern, pattern
const PUBLISHED_FILTER: &str = r#"
    WHERE p.published = 1
      AND (? IS NULL OR EXISTS (
            SELECT 1 FROM post_tags pt
            INNER JOIN tags t ON t.id = pt.tag_id
            WHERE pt.post_id = p.id AND t.name = ?))
      AND (? IS NULL OR LOWER(p.title) LIKE ? OR LOWER(p.content) LIKE ?)
"#;

fn list_sql() -> String {
    format!(
        "SELECT p.id, p.title, p.slug, p.content, p.excerpt, p.published, p.created_at, p.updated_at \
         FROM posts p {} ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
        PUBLISHED_FILTER
    )
}

fn count_sql() -> String {
    format!("SELECT COUNT(*) AS count FROM posts p {}", PUBLISHED_FILTER)
}

fn search_pattern(params: &ListParams) -> Option<String> {
    params.search.as_ref().map(|s| format!("%{}%", s))
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &NewPost) -> Result<Post> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_post_sqlite(pool, post).await,
            Backend::Mysql(pool) => create_post_mysql(pool, post).await,
        }
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        const SQL: &str = "SELECT COUNT(*) AS count FROM posts WHERE slug = ?";

        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(SQL)
                .bind(slug)
                .fetch_one(pool)
                .await
                .context("Failed to check slug existence")?
                .get("count"),
            Backend::Mysql(pool) => sqlx::query(SQL)
                .bind(slug)
                .fetch_one(pool)
                .await
                .context("Failed to check slug existence")?
                .get("count"),
        };

        Ok(count > 0)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_post_by_slug_sqlite(pool, slug).await,
            Backend::Mysql(pool) => get_post_by_slug_mysql(pool, slug).await,
        }
    }

    async fn list_published(&self, params: &ListParams) -> Result<Vec<Post>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_published_sqlite(pool, params).await,
            Backend::Mysql(pool) => list_published_mysql(pool, params).await,
        }
    }

    async fn count_published(&self, params: &ListParams) -> Result<i64> {
        let sql = count_sql();
        let pattern = search_pattern(params);

        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(&params.tag)
                .bind(&params.tag)
                .bind(&params.search)
                .bind(&pattern)
                .bind(&pattern)
                .fetch_one(pool)
                .await
                .context("Failed to count published posts")?
                .get("count"),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(&params.tag)
                .bind(&params.tag)
                .bind(&params.search)
                .bind(&pattern)
                .bind(&pattern)
                .fetch_one(pool)
                .await
                .context("Failed to count published posts")?
                .get("count"),
        };

        Ok(count)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        const SQL: &str = "DELETE FROM posts WHERE id = ?";

        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(SQL)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to delete post")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(SQL)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to delete post")?;
            }
        }

        Ok(())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &NewPost) -> Result<Post> {
    let now = Utc::now();

    let result = sqlx::query(INSERT_POST)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(post.published)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to create post with slug '{}'", post.slug))?;

    Ok(inserted_post(result.last_insert_rowid(), post, now))
}

async fn get_post_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<Post>> {
    let row = sqlx::query(SELECT_BY_SLUG)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by slug")?;

    match row {
        Some(row) => {
            let mut post = row_to_post_sqlite(&row);
            post.tags = tag_names_sqlite(pool, post.id).await?;
            Ok(Some(post))
        }
        None => Ok(None),
    }
}

async fn list_published_sqlite(pool: &SqlitePool, params: &ListParams) -> Result<Vec<Post>> {
    let sql = list_sql();
    let pattern = search_pattern(params);

    let rows = sqlx::query(&sql)
        .bind(&params.tag)
        .bind(&params.tag)
        .bind(&params.search)
        .bind(&pattern)
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list published posts")?;

    let mut posts = Vec::with_capacity(rows.len());
    for row in rows {
        let mut post = row_to_post_sqlite(&row);
        post.tags = tag_names_sqlite(pool, post.id).await?;
        posts.push(post);
    }

    Ok(posts)
}

async fn tag_names_sqlite(pool: &SqlitePool, post_id: i64) -> Result<Vec<String>> {
    let rows = sqlx::query(SELECT_TAG_NAMES)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to get tags for post")?;

    Ok(rows.iter().map(|row| row.get("name")).collect())
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        content: row.get("content"),
        excerpt: row.get("excerpt"),
        published: row.get("published"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        tags: Vec::new(),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &NewPost) -> Result<Post> {
    let now = Utc::now();

    let result = sqlx::query(INSERT_POST)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(post.published)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to create post with slug '{}'", post.slug))?;

    Ok(inserted_post(result.last_insert_id() as i64, post, now))
}

async fn get_post_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<Post>> {
    let row = sqlx::query(SELECT_BY_SLUG)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by slug")?;

    match row {
        Some(row) => {
            let mut post = row_to_post_mysql(&row);
            post.tags = tag_names_mysql(pool, post.id).await?;
            Ok(Some(post))
        }
        None => Ok(None),
    }
}

async fn list_published_mysql(pool: &MySqlPool, params: &ListParams) -> Result<Vec<Post>> {
    let sql = list_sql();
    let pattern = search_pattern(params);

    let rows = sqlx::query(&sql)
        .bind(&params.tag)
        .bind(&params.tag)
        .bind(&params.search)
        .bind(&pattern)
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list published posts")?;

    let mut posts = Vec::with_capacity(rows.len());
    for row in rows {
        let mut post = row_to_post_mysql(&row);
        post.tags = tag_names_mysql(pool, post.id).await?;
        posts.push(post);
    }

    Ok(posts)
}

async fn tag_names_mysql(pool: &MySqlPool, post_id: i64) -> Result<Vec<String>> {
    let rows = sqlx::query(SELECT_TAG_NAMES)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to get tags for post")?;

    Ok(rows.iter().map(|row| row.get("name")).collect())
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Post {
    Post {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        content: row.get("content"),
        excerpt: row.get("excerpt"),
        published: row.get("published"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        tags: Vec::new(),
    }
}

fn inserted_post(id: i64, post: &NewPost, now: chrono::DateTime<Utc>) -> Post {
    Post {
        id,
        title: post.title.clone(),
        slug: post.slug.clone(),
        content: post.content.clone(),
        excerpt: post.excerpt.clone(),
        published: post.published,
        created_at: now,
        updated_at: now,
        tags: Vec::new(),
    }
}
