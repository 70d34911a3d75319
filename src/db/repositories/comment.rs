//! Comment repository
//!
//! Database operations for comments. Comments are always returned in
//! insertion order.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Comment, CreateCommentInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment. `posted_at` defaults to the current time.
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment>;

    /// Get comment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Comments on a post, in insertion order
    async fn find_by_post(&self, post_id: i64) -> Result<Vec<Comment>>;

    /// Comments on any post written by the user with the given email
    async fn find_by_post_author_email(&self, email: &str) -> Result<Vec<Comment>>;

    /// Count all comments
    async fn count(&self) -> Result<i64>;

    /// Count comments on a post
    async fn count_by_post(&self, post_id: i64) -> Result<i64>;

    /// Delete a comment
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    /// Create a new SQLx comment repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_comment_sqlite(pool, input).await,
            Backend::Mysql(pool) => create_comment_mysql(pool, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_comment_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_comment_by_id_mysql(pool, id).await,
        }
    }

    async fn find_by_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => find_comments_by_post_sqlite(pool, post_id).await,
            Backend::Mysql(pool) => find_comments_by_post_mysql(pool, post_id).await,
        }
    }

    async fn find_by_post_author_email(&self, email: &str) -> Result<Vec<Comment>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => find_comments_by_post_author_sqlite(pool, email).await,
            Backend::Mysql(pool) => find_comments_by_post_author_mysql(pool, email).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM comments";
        let count = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .fetch_one(pool)
                .await
                .context("Failed to count comments")?
                .get("count"),
            Backend::Mysql(pool) => sqlx::query(sql)
                .fetch_one(pool)
                .await
                .context("Failed to count comments")?
                .get("count"),
        };
        Ok(count)
    }

    async fn count_by_post(&self, post_id: i64) -> Result<i64> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => count_comments_by_post_sqlite(pool, post_id).await,
            Backend::Mysql(pool) => count_comments_by_post_mysql(pool, post_id).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => delete_comment_sqlite(pool, id).await,
            Backend::Mysql(pool) => delete_comment_mysql(pool, id).await,
        }
    }
}

const INSERT_COMMENT: &str =
    "INSERT INTO comments (post_id, author, content, posted_at) VALUES (?, ?, ?, ?)";

const COMMENT_BY_ID_SQL: &str = r#"
    SELECT c.id, c.post_id, c.author, c.content, c.posted_at
    FROM comments c
    WHERE c.id = ?
"#;

const COMMENTS_BY_POST_SQL: &str = r#"
    SELECT c.id, c.post_id, c.author, c.content, c.posted_at
    FROM comments c
    WHERE c.post_id = ?
    ORDER BY c.id ASC
"#;

const COMMENTS_BY_POST_AUTHOR_SQL: &str = r#"
    SELECT c.id, c.post_id, c.author, c.content, c.posted_at
    FROM comments c
    INNER JOIN posts p ON p.id = c.post_id
    INNER JOIN users u ON u.id = p.author_id
    WHERE u.email = ?
    ORDER BY c.id ASC
"#;

const COUNT_BY_POST_SQL: &str = "SELECT COUNT(*) as count FROM comments WHERE post_id = ?";

const DELETE_COMMENT_SQL: &str = "DELETE FROM comments WHERE id = ?";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_comment_sqlite(pool: &SqlitePool, input: &CreateCommentInput) -> Result<Comment> {
    let posted_at = input.posted_at.unwrap_or_else(Utc::now);

    let result = sqlx::query(INSERT_COMMENT)
        .bind(input.post_id)
        .bind(&input.author)
        .bind(&input.content)
        .bind(posted_at)
        .execute(pool)
        .await
        .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        post_id: input.post_id,
        author: input.author.clone(),
        content: input.content.clone(),
        posted_at,
    })
}

async fn get_comment_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(COMMENT_BY_ID_SQL)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment by ID")?;

    row.as_ref().map(row_to_comment_sqlite).transpose()
}

async fn find_comments_by_post_sqlite(pool: &SqlitePool, post_id: i64) -> Result<Vec<Comment>> {
    let rows = sqlx::query(COMMENTS_BY_POST_SQL)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to find comments by post")?;

    rows.iter().map(row_to_comment_sqlite).collect()
}

async fn find_comments_by_post_author_sqlite(
    pool: &SqlitePool,
    email: &str,
) -> Result<Vec<Comment>> {
    let rows = sqlx::query(COMMENTS_BY_POST_AUTHOR_SQL)
        .bind(email)
        .fetch_all(pool)
        .await
        .context("Failed to find comments by post author")?;

    rows.iter().map(row_to_comment_sqlite).collect()
}

async fn count_comments_by_post_sqlite(pool: &SqlitePool, post_id: i64) -> Result<i64> {
    let row = sqlx::query(COUNT_BY_POST_SQL)
        .bind(post_id)
        .fetch_one(pool)
        .await
        .context("Failed to count comments")?;

    Ok(row.get("count"))
}

async fn delete_comment_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query(DELETE_COMMENT_SQL)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete comment")?;
    Ok(())
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        author: row.try_get("author")?,
        content: row.try_get("content")?,
        posted_at: row.try_get("posted_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_comment_mysql(pool: &MySqlPool, input: &CreateCommentInput) -> Result<Comment> {
    let posted_at = input.posted_at.unwrap_or_else(Utc::now);

    let result = sqlx::query(INSERT_COMMENT)
        .bind(input.post_id)
        .bind(&input.author)
        .bind(&input.content)
        .bind(posted_at)
        .execute(pool)
        .await
        .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_id() as i64,
        post_id: input.post_id,
        author: input.author.clone(),
        content: input.content.clone(),
        posted_at,
    })
}

async fn get_comment_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(COMMENT_BY_ID_SQL)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment by ID")?;

    row.as_ref().map(row_to_comment_mysql).transpose()
}

async fn find_comments_by_post_mysql(pool: &MySqlPool, post_id: i64) -> Result<Vec<Comment>> {
    let rows = sqlx::query(COMMENTS_BY_POST_SQL)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to find comments by post")?;

    rows.iter().map(row_to_comment_mysql).collect()
}

async fn find_comments_by_post_author_mysql(
    pool: &MySqlPool,
    email: &str,
) -> Result<Vec<Comment>> {
    let rows = sqlx::query(COMMENTS_BY_POST_AUTHOR_SQL)
        .bind(email)
        .fetch_all(pool)
        .await
        .context("Failed to find comments by post author")?;

    rows.iter().map(row_to_comment_mysql).collect()
}

async fn count_comments_by_post_mysql(pool: &MySqlPool, post_id: i64) -> Result<i64> {
    let row = sqlx::query(COUNT_BY_POST_SQL)
        .bind(post_id)
        .fetch_one(pool)
        .await
        .context("Failed to count comments")?;

    Ok(row.get("count"))
}

async fn delete_comment_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query(DELETE_COMMENT_SQL)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete comment")?;
    Ok(())
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        author: row.try_get("author")?,
        content: row.try_get("content")?,
        posted_at: row.try_get("posted_at")?,
    })
}
