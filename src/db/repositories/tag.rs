//! Tag repository
//!
//! Database operations for tags and the post/tag association.
//!
//! This module provides:
//! - `TagRepository` trait defining the interface for tag data access
//! - `SqlxTagRepository` implementing the trait for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Tag, TagCloudEntry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create a new tag
    async fn create(&self, tag: &Tag) -> Result<Tag>;

    /// Get tag by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// Get tag by name
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// List all tags ordered by name
    async fn list(&self) -> Result<Vec<Tag>>;

    /// Count all tags
    async fn count(&self) -> Result<i64>;

    /// Tags in use with the number of posts carrying each, ordered by name
    async fn cloud(&self) -> Result<Vec<TagCloudEntry>>;

    /// Associate a tag with a post. Associating twice is a no-op.
    async fn add_to_post(&self, tag_id: i64, post_id: i64) -> Result<()>;

    /// Remove a tag from a post
    async fn remove_from_post(&self, tag_id: i64, post_id: i64) -> Result<()>;

    /// Tags on a post, ordered by name
    async fn get_by_post_id(&self, post_id: i64) -> Result<Vec<Tag>>;

    /// Delete a tag and its associations
    async fn delete(&self, id: i64) -> Result<()>;
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

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, tag: &Tag) -> Result<Tag> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_tag_sqlite(pool, tag).await,
            Backend::Mysql(pool) => create_tag_mysql(pool, tag).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_tag_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_tag_by_id_mysql(pool, id).await,
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_tag_by_name_sqlite(pool, name).await,
            Backend::Mysql(pool) => get_tag_by_name_mysql(pool, name).await,
        }
    }

    async fn list(&self) -> Result<Vec<Tag>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_tags_sqlite(pool).await,
            Backend::Mysql(pool) => list_tags_mysql(pool).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM tags";
        let count = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .fetch_one(pool)
                .await
                .context("Failed to count tags")?
                .get("count"),
            Backend::Mysql(pool) => sqlx::query(sql)
                .fetch_one(pool)
                .await
                .context("Failed to count tags")?
                .get("count"),
        };
        Ok(count)
    }

    async fn cloud(&self) -> Result<Vec<TagCloudEntry>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => tag_cloud_sqlite(pool).await,
            Backend::Mysql(pool) => tag_cloud_mysql(pool).await,
        }
    }

    async fn add_to_post(&self, tag_id: i64, post_id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => add_tag_to_post_sqlite(pool, tag_id, post_id).await,
            Backend::Mysql(pool) => add_tag_to_post_mysql(pool, tag_id, post_id).await,
        }
    }

    async fn remove_from_post(&self, tag_id: i64, post_id: i64) -> Result<()> {
        let sql = "DELETE FROM post_tags WHERE post_id = ? AND tag_id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql)
                    .bind(post_id)
                    .bind(tag_id)
                    .execute(pool)
                    .await
                    .context("Failed to remove tag from post")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql)
                    .bind(post_id)
                    .bind(tag_id)
                    .execute(pool)
                    .await
                    .context("Failed to remove tag from post")?;
            }
        }
        Ok(())
    }

    async fn get_by_post_id(&self, post_id: i64) -> Result<Vec<Tag>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_tags_by_post_sqlite(pool, post_id).await,
            Backend::Mysql(pool) => get_tags_by_post_mysql(pool, post_id).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                for statement in DELETE_TAG_CASCADE {
                    sqlx::query(statement)
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to delete tag")?;
                }
                tx.commit().await.context("Failed to commit tag deletion")?;
            }
            Backend::Mysql(pool) => {
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                for statement in DELETE_TAG_CASCADE {
                    sqlx::query(statement)
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to delete tag")?;
                }
                tx.commit().await.context("Failed to commit tag deletion")?;
            }
        }
        Ok(())
    }
}

const DELETE_TAG_CASCADE: [&str; 2] = [
    "DELETE FROM post_tags WHERE tag_id = ?",
    "DELETE FROM tags WHERE id = ?",
];

/// Inner join: tags without posts do not appear in the cloud
const TAG_CLOUD_SQL: &str = r#"
    SELECT t.name as tag, COUNT(pt.post_id) as pound
    FROM tags t
    INNER JOIN post_tags pt ON pt.tag_id = t.id
    GROUP BY t.id, t.name
    ORDER BY t.name ASC
"#;

const TAGS_BY_POST_SQL: &str = r#"
    SELECT t.id, t.name, t.created_at
    FROM tags t
    INNER JOIN post_tags pt ON pt.tag_id = t.id
    WHERE pt.post_id = ?
    ORDER BY t.name ASC
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_tag_sqlite(pool: &SqlitePool, tag: &Tag) -> Result<Tag> {
    let now = Utc::now();

    let result = sqlx::query("INSERT INTO tags (name, created_at) VALUES (?, ?)")
        .bind(&tag.name)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_rowid(),
        name: tag.name.clone(),
        created_at: now,
    })
}

async fn get_tag_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, name, created_at FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by ID")?;

    row.as_ref().map(row_to_tag_sqlite).transpose()
}

async fn get_tag_by_name_sqlite(pool: &SqlitePool, name: &str) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, name, created_at FROM tags WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by name")?;

    row.as_ref().map(row_to_tag_sqlite).transpose()
}

async fn list_tags_sqlite(pool: &SqlitePool) -> Result<Vec<Tag>> {
    let rows = sqlx::query("SELECT id, name, created_at FROM tags ORDER BY name ASC")
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    rows.iter().map(row_to_tag_sqlite).collect()
}

async fn tag_cloud_sqlite(pool: &SqlitePool) -> Result<Vec<TagCloudEntry>> {
    let rows = sqlx::query(TAG_CLOUD_SQL)
        .fetch_all(pool)
        .await
        .context("Failed to build tag cloud")?;

    rows.iter()
        .map(|row| {
            Ok(TagCloudEntry {
                tag: row.try_get("tag")?,
                pound: row.try_get("pound")?,
            })
        })
        .collect()
}

async fn add_tag_to_post_sqlite(pool: &SqlitePool, tag_id: i64, post_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
        .bind(post_id)
        .bind(tag_id)
        .execute(pool)
        .await
        .context("Failed to add tag to post")?;
    Ok(())
}

async fn get_tags_by_post_sqlite(pool: &SqlitePool, post_id: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query(TAGS_BY_POST_SQL)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to get tags by post")?;

    rows.iter().map(row_to_tag_sqlite).collect()
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Tag> {
    Ok(Tag {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_tag_mysql(pool: &MySqlPool, tag: &Tag) -> Result<Tag> {
    let now = Utc::now();

    let result = sqlx::query("INSERT INTO tags (name, created_at) VALUES (?, ?)")
        .bind(&tag.name)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_id() as i64,
        name: tag.name.clone(),
        created_at: now,
    })
}

async fn get_tag_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, name, created_at FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by ID")?;

    row.as_ref().map(row_to_tag_mysql).transpose()
}

async fn get_tag_by_name_mysql(pool: &MySqlPool, name: &str) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, name, created_at FROM tags WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by name")?;

    row.as_ref().map(row_to_tag_mysql).transpose()
}

async fn list_tags_mysql(pool: &MySqlPool) -> Result<Vec<Tag>> {
    let rows = sqlx::query("SELECT id, name, created_at FROM tags ORDER BY name ASC")
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    rows.iter().map(row_to_tag_mysql).collect()
}

async fn tag_cloud_mysql(pool: &MySqlPool) -> Result<Vec<TagCloudEntry>> {
    let rows = sqlx::query(TAG_CLOUD_SQL)
        .fetch_all(pool)
        .await
        .context("Failed to build tag cloud")?;

    rows.iter()
        .map(|row| {
            Ok(TagCloudEntry {
                tag: row.try_get("tag")?,
                pound: row.try_get("pound")?,
            })
        })
        .collect()
}

async fn add_tag_to_post_mysql(pool: &MySqlPool, tag_id: i64, post_id: i64) -> Result<()> {
    sqlx::query("INSERT IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
        .bind(post_id)
        .bind(tag_id)
        .execute(pool)
        .await
        .context("Failed to add tag to post")?;
    Ok(())
}

async fn get_tags_by_post_mysql(pool: &MySqlPool, post_id: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query(TAGS_BY_POST_SQL)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to get tags by post")?;

    rows.iter().map(row_to_tag_mysql).collect()
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Tag> {
    Ok(Tag {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
    })
}
