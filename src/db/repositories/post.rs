//! Post repository
//!
//! Database operations for posts, including author joins, tag intersection
//! and the transactional cascade delete.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreatePostInput, Post, UpdatePostInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Create a new post. `posted_at` defaults to the current time.
    async fn create(&self, input: &CreatePostInput) -> Result<Post>;

    /// Get post by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Count total posts
    async fn count(&self) -> Result<i64>;

    /// List all posts, most recent first
    async fn list(&self) -> Result<Vec<Post>>;

    /// List the `limit` most recent posts
    async fn list_recent(&self, limit: i64) -> Result<Vec<Post>>;

    /// Posts written by the given user, most recent first
    async fn find_by_author(&self, author_id: i64) -> Result<Vec<Post>>;

    /// Posts written by the user with the given email, most recent first
    async fn find_by_author_email(&self, email: &str) -> Result<Vec<Post>>;

    /// The most recent post
    async fn find_latest(&self) -> Result<Option<Post>>;

    /// The nearest post published before `posted_at`
    async fn find_previous(&self, posted_at: DateTime<Utc>) -> Result<Option<Post>>;

    /// The nearest post published after `posted_at`
    async fn find_next(&self, posted_at: DateTime<Utc>) -> Result<Option<Post>>;

    /// Update title and/or content. The publication time is left untouched.
    async fn update(&self, id: i64, input: &UpdatePostInput) -> Result<Post>;

    /// Delete a post, its comments and its tag associations in one transaction
    async fn delete(&self, id: i64) -> Result<()>;

    /// Posts carrying every one of the given tag names.
    ///
    /// Duplicate names are ignored. An empty list yields no posts.
    async fn find_tagged_with(&self, tags: &[String]) -> Result<Vec<Post>>;
}

/// SQLx-based post repository implementation
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

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, input: &CreatePostInput) -> Result<Post> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_post_sqlite(pool, input).await,
            Backend::Mysql(pool) => create_post_mysql(pool, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts p WHERE p.id = ?", POST_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_optional_sqlite(pool, &sql, id).await,
            Backend::Mysql(pool) => fetch_optional_mysql(pool, &sql, id).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => count_posts_sqlite(pool).await,
            Backend::Mysql(pool) => count_posts_mysql(pool).await,
        }
    }

    async fn list(&self) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {} FROM posts p ORDER BY p.posted_at DESC, p.id DESC",
            POST_COLUMNS
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_all_sqlite(pool, &sql, None).await,
            Backend::Mysql(pool) => fetch_all_mysql(pool, &sql, None).await,
        }
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {} FROM posts p ORDER BY p.posted_at DESC, p.id DESC LIMIT ?",
            POST_COLUMNS
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_all_sqlite(pool, &sql, Some(limit)).await,
            Backend::Mysql(pool) => fetch_all_mysql(pool, &sql, Some(limit)).await,
        }
    }

    async fn find_by_author(&self, author_id: i64) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {} FROM posts p WHERE p.author_id = ? ORDER BY p.posted_at DESC, p.id DESC",
            POST_COLUMNS
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_all_sqlite(pool, &sql, Some(author_id)).await,
            Backend::Mysql(pool) => fetch_all_mysql(pool, &sql, Some(author_id)).await,
        }
    }

    async fn find_by_author_email(&self, email: &str) -> Result<Vec<Post>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => find_by_author_email_sqlite(pool, email).await,
            Backend::Mysql(pool) => find_by_author_email_mysql(pool, email).await,
        }
    }

    async fn find_latest(&self) -> Result<Option<Post>> {
        Ok(self.list_recent(1).await?.into_iter().next())
    }

    async fn find_previous(&self, posted_at: DateTime<Utc>) -> Result<Option<Post>> {
        let sql = format!(
            "SELECT {} FROM posts p WHERE p.posted_at < ? {}",
            POST_COLUMNS, "ORDER BY p.posted_at DESC, p.id DESC LIMIT 1"
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_adjacent_sqlite(pool, &sql, posted_at).await,
            Backend::Mysql(pool) => fetch_adjacent_mysql(pool, &sql, posted_at).await,
        }
    }

    async fn find_next(&self, posted_at: DateTime<Utc>) -> Result<Option<Post>> {
        let sql = format!(
            "SELECT {} FROM posts p WHERE p.posted_at > ? {}",
            POST_COLUMNS, "ORDER BY p.posted_at ASC, p.id ASC LIMIT 1"
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_adjacent_sqlite(pool, &sql, posted_at).await,
            Backend::Mysql(pool) => fetch_adjacent_mysql(pool, &sql, posted_at).await,
        }
    }

    async fn update(&self, id: i64, input: &UpdatePostInput) -> Result<Post> {
        let existing = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Post not found: {}", id))?;

        let title = input.title.as_deref().unwrap_or(&existing.title);
        let content = input.content.as_deref().unwrap_or(&existing.content);

        match self.pool.backend() {
            Backend::Sqlite(pool) => update_post_sqlite(pool, id, title, content).await?,
            Backend::Mysql(pool) => update_post_mysql(pool, id, title, content).await?,
        }

        Ok(Post {
            title: title.to_string(),
            content: content.to_string(),
            ..existing
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => delete_post_sqlite(pool, id).await,
            Backend::Mysql(pool) => delete_post_mysql(pool, id).await,
        }
    }

    async fn find_tagged_with(&self, tags: &[String]) -> Result<Vec<Post>> {
        let mut names: Vec<&str> = tags.iter().map(String::as_str).collect();
        names.sort_unstable();
        names.dedup();

        if names.is_empty() {
            return Ok(Vec::new());
        }

        match self.pool.backend() {
            Backend::Sqlite(pool) => find_tagged_with_sqlite(pool, &names).await,
            Backend::Mysql(pool) => find_tagged_with_mysql(pool, &names).await,
        }
    }
}

const POST_COLUMNS: &str = "p.id, p.author_id, p.title, p.content, p.posted_at";

/// Children first, then the post itself. Each binds the post ID once.
const DELETE_POST_CASCADE: [&str; 3] = [
    "DELETE FROM comments WHERE post_id = ?",
    "DELETE FROM post_tags WHERE post_id = ?",
    "DELETE FROM posts WHERE id = ?",
];

/// Build the intersection query for `count` distinct tag names
fn tagged_with_sql(count: usize) -> String {
    let placeholders = vec!["?"; count].join(", ");
    format!(
        r#"
        SELECT {columns}
        FROM posts p
        INNER JOIN post_tags pt ON pt.post_id = p.id
        INNER JOIN tags t ON t.id = pt.tag_id
        WHERE t.name IN ({placeholders})
        GROUP BY p.id, p.author_id, p.title, p.content, p.posted_at
        HAVING COUNT(DISTINCT t.id) = ?
        ORDER BY p.posted_at DESC, p.id DESC
        "#,
        columns = POST_COLUMNS,
        placeholders = placeholders,
    )
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, input: &CreatePostInput) -> Result<Post> {
    let posted_at = input.posted_at.unwrap_or_else(Utc::now);

    let result = sqlx::query(
        "INSERT INTO posts (author_id, title, content, posted_at) VALUES (?, ?, ?, ?)",
    )
    .bind(input.author_id)
    .bind(&input.title)
    .bind(&input.content)
    .bind(posted_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        author_id: input.author_id,
        title: input.title.clone(),
        content: input.content.clone(),
        posted_at,
    })
}

async fn fetch_optional_sqlite(pool: &SqlitePool, sql: &str, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post")?;

    row.as_ref().map(row_to_post_sqlite).transpose()
}

async fn fetch_all_sqlite(pool: &SqlitePool, sql: &str, arg: Option<i64>) -> Result<Vec<Post>> {
    let mut query = sqlx::query(sql);
    if let Some(arg) = arg {
        query = query.bind(arg);
    }

    let rows = query.fetch_all(pool).await.context("Failed to list posts")?;
    rows.iter().map(row_to_post_sqlite).collect()
}

async fn fetch_adjacent_sqlite(
    pool: &SqlitePool,
    sql: &str,
    posted_at: DateTime<Utc>,
) -> Result<Option<Post>> {
    let row = sqlx::query(sql)
        .bind(posted_at)
        .fetch_optional(pool)
        .await
        .context("Failed to get adjacent post")?;

    row.as_ref().map(row_to_post_sqlite).transpose()
}

async fn count_posts_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM posts")
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;

    Ok(row.get("count"))
}

async fn find_by_author_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Vec<Post>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM posts p
        INNER JOIN users u ON u.id = p.author_id
        WHERE u.email = ?
        ORDER BY p.posted_at DESC, p.id DESC
        "#,
        POST_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(email)
        .fetch_all(pool)
        .await
        .context("Failed to find posts by author email")?;

    rows.iter().map(row_to_post_sqlite).collect()
}

async fn update_post_sqlite(pool: &SqlitePool, id: i64, title: &str, content: &str) -> Result<()> {
    sqlx::query("UPDATE posts SET title = ?, content = ? WHERE id = ?")
        .bind(title)
        .bind(content)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update post")?;
    Ok(())
}

async fn delete_post_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    for statement in DELETE_POST_CASCADE {
        sqlx::query(statement)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete post")?;
    }

    tx.commit().await.context("Failed to commit post deletion")?;
    Ok(())
}

async fn find_tagged_with_sqlite(pool: &SqlitePool, names: &[&str]) -> Result<Vec<Post>> {
    let sql = tagged_with_sql(names.len());
    let mut query = sqlx::query(&sql);
    for name in names {
        query = query.bind(*name);
    }

    let rows = query
        .bind(names.len() as i64)
        .fetch_all(pool)
        .await
        .context("Failed to find posts by tags")?;

    rows.iter().map(row_to_post_sqlite).collect()
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        posted_at: row.try_get("posted_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, input: &CreatePostInput) -> Result<Post> {
    let posted_at = input.posted_at.unwrap_or_else(Utc::now);

    let result = sqlx::query(
        "INSERT INTO posts (author_id, title, content, posted_at) VALUES (?, ?, ?, ?)",
    )
    .bind(input.author_id)
    .bind(&input.title)
    .bind(&input.content)
    .bind(posted_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_id() as i64,
        author_id: input.author_id,
        title: input.title.clone(),
        content: input.content.clone(),
        posted_at,
    })
}

async fn fetch_optional_mysql(pool: &MySqlPool, sql: &str, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post")?;

    row.as_ref().map(row_to_post_mysql).transpose()
}

async fn fetch_all_mysql(pool: &MySqlPool, sql: &str, arg: Option<i64>) -> Result<Vec<Post>> {
    let mut query = sqlx::query(sql);
    if let Some(arg) = arg {
        query = query.bind(arg);
    }

    let rows = query.fetch_all(pool).await.context("Failed to list posts")?;
    rows.iter().map(row_to_post_mysql).collect()
}

async fn fetch_adjacent_mysql(
    pool: &MySqlPool,
    sql: &str,
    posted_at: DateTime<Utc>,
) -> Result<Option<Post>> {
    let row = sqlx::query(sql)
        .bind(posted_at)
        .fetch_optional(pool)
        .await
        .context("Failed to get adjacent post")?;

    row.as_ref().map(row_to_post_mysql).transpose()
}

async fn count_posts_mysql(pool: &MySqlPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM posts")
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;

    Ok(row.get("count"))
}

async fn find_by_author_email_mysql(pool: &MySqlPool, email: &str) -> Result<Vec<Post>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM posts p
        INNER JOIN users u ON u.id = p.author_id
        WHERE u.email = ?
        ORDER BY p.posted_at DESC, p.id DESC
        "#,
        POST_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(email)
        .fetch_all(pool)
        .await
        .context("Failed to find posts by author email")?;

    rows.iter().map(row_to_post_mysql).collect()
}

async fn update_post_mysql(pool: &MySqlPool, id: i64, title: &str, content: &str) -> Result<()> {
    sqlx::query("UPDATE posts SET title = ?, content = ? WHERE id = ?")
        .bind(title)
        .bind(content)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update post")?;
    Ok(())
}

async fn delete_post_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    for statement in DELETE_POST_CASCADE {
        sqlx::query(statement)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete post")?;
    }

    tx.commit().await.context("Failed to commit post deletion")?;
    Ok(())
}

async fn find_tagged_with_mysql(pool: &MySqlPool, names: &[&str]) -> Result<Vec<Post>> {
    let sql = tagged_with_sql(names.len());
    let mut query = sqlx::query(&sql);
    for name in names {
        query = query.bind(*name);
    }

    let rows = query
        .bind(names.len() as i64)
        .fetch_all(pool)
        .await
        .context("Failed to find posts by tags")?;

    rows.iter().map(row_to_post_mysql).collect()
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        posted_at: row.try_get("posted_at")?,
    })
}
