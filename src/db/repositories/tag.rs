//! Tag repository
//!
//! Database operations for tags and their post associations.
//!
//! This module provides:
//! - `TagRepository` trait defining the interface for tag data access
//! - `SqlxTagRepository` implementing the trait for SQLite and MySQL

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Tag, TagAggregate};

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Fetch the tag with this (already normalized) name, creating it if
    /// missing
    async fn get_or_create(&self, name: &str) -> Result<Tag>;

    /// Get tag by name
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// Associate a tag with a post. Associating twice is a no-op.
    async fn attach_to_post(&self, tag_id: i64, post_id: i64) -> Result<()>;

    /// Every tag with at least one published post, with its published post
    /// count and newest published post date, in tag creation order
    async fn aggregates(&self) -> Result<Vec<TagAggregate>>;
}

/// SQLx-based tag repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    /// Create a new SQLx tag repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_BY_NAME: &str = "SELECT id, name, created_at FROM tags WHERE name = ?";

// Only published posts count. Tags whose posts are all drafts drop out.
const SELECT_AGGREGATES: &str = r#"
    SELECT t.name AS name,
           COUNT(p.id) AS post_count,
           MAX(p.created_at) AS latest_post_date
    FROM tags t
    INNER JOIN post_tags pt ON pt.tag_id = t.id
    INNER JOIN posts p ON p.id = pt.post_id AND p.published = 1
    GROUP BY t.id, t.name
    HAVING COUNT(p.id) > 0
    ORDER BY t.id
"#;

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn get_or_create(&self, name: &str) -> Result<Tag> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_or_create_sqlite(pool, name).await,
            Backend::Mysql(pool) => get_or_create_mysql(pool, name).await,
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_by_name_sqlite(pool, name).await,
            Backend::Mysql(pool) => get_by_name_mysql(pool, name).await,
        }
    }

    async fn attach_to_post(&self, tag_id: i64, post_id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                    .bind(post_id)
                    .bind(tag_id)
                    .execute(pool)
                    .await
                    .context("Failed to attach tag to post")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query("INSERT IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                    .bind(post_id)
                    .bind(tag_id)
                    .execute(pool)
                    .await
                    .context("Failed to attach tag to post")?;
            }
        }

        Ok(())
    }

    async fn aggregates(&self) -> Result<Vec<TagAggregate>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(SELECT_AGGREGATES)
                    .fetch_all(pool)
                    .await
                    .context("Failed to aggregate tags")?;
                rows.iter().map(row_to_aggregate_sqlite).collect()
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(SELECT_AGGREGATES)
                    .fetch_all(pool)
                    .await
                    .context("Failed to aggregate tags")?;
                rows.iter().map(row_to_aggregate_mysql).collect()
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_or_create_sqlite(pool: &SqlitePool, name: &str) -> Result<Tag> {
    sqlx::query("INSERT OR IGNORE INTO tags (name, created_at) VALUES (?, ?)")
        .bind(name)
        .bind(Utc::now())
        .execute(pool)
        .await
        .with_context(|| format!("Failed to create tag '{}'", name))?;

    get_by_name_sqlite(pool, name)
        .await?
        .with_context(|| format!("Tag '{}' missing after insert", name))
}

async fn get_by_name_sqlite(pool: &SqlitePool, name: &str) -> Result<Option<Tag>> {
    let row = sqlx::query(SELECT_BY_NAME)
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by name")?;

    Ok(row.map(|row| Tag {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }))
}

fn row_to_aggregate_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<TagAggregate> {
    let latest: Option<DateTime<Utc>> = row
        .try_get("latest_post_date")
        .context("Failed to decode latest post date")?;
    Ok(TagAggregate::new(
        row.get::<String, _>("name"),
        row.get::<i64, _>("post_count"),
        latest,
    ))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_or_create_mysql(pool: &MySqlPool, name: &str) -> Result<Tag> {
    sqlx::query("INSERT IGNORE INTO tags (name, created_at) VALUES (?, ?)")
        .bind(name)
        .bind(Utc::now())
        .execute(pool)
        .await
        .with_context(|| format!("Failed to create tag '{}'", name))?;

    get_by_name_mysql(pool, name)
        .await?
        .with_context(|| format!("Tag '{}' missing after insert", name))
}

async fn get_by_name_mysql(pool: &MySqlPool, name: &str) -> Result<Option<Tag>> {
    let row = sqlx::query(SELECT_BY_NAME)
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by name")?;

    Ok(row.map(|row| Tag {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }))
}

fn row_to_aggregate_mysql(row: &sqlx::mysql::MySqlRow) -> Result<TagAggregate> {
    let latest: Option<DateTime<Utc>> = row
        .try_get("latest_post_date")
        .context("Failed to decode latest post date")?;
    Ok(TagAggregate::new(
        row.get::<String, _>("name"),
        row.get::<i64, _>("post_count"),
        latest,
    ))
}
