//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get the user whose email and password both match exactly
    async fn find_by_credentials(&self, email: &str, password: &str) -> Result<Option<User>>;

    /// Update a user's password, fullname and admin flag
    async fn update(&self, user: &User) -> Result<User>;

    /// Delete a user together with their posts, comments on those posts and
    /// tag associations, in one transaction
    async fn delete(&self, id: i64) -> Result<()>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// List all users ordered by email
    async fn list(&self) -> Result<Vec<User>>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_user_sqlite(pool, user).await,
            Backend::Mysql(pool) => create_user_mysql(pool, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_user_by_id_mysql(pool, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_by_email_sqlite(pool, email).await,
            Backend::Mysql(pool) => get_user_by_email_mysql(pool, email).await,
        }
    }

    async fn find_by_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => find_by_credentials_sqlite(pool, email, password).await,
            Backend::Mysql(pool) => find_by_credentials_mysql(pool, email, password).await,
        }
    }

    async fn update(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_user_sqlite(pool, user).await,
            Backend::Mysql(pool) => update_user_mysql(pool, user).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => delete_user_sqlite(pool, id).await,
            Backend::Mysql(pool) => delete_user_mysql(pool, id).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => count_users_sqlite(pool).await,
            Backend::Mysql(pool) => count_users_mysql(pool).await,
        }
    }

    async fn list(&self) -> Result<Vec<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_users_sqlite(pool).await,
            Backend::Mysql(pool) => list_users_mysql(pool).await,
        }
    }
}

const USER_COLUMNS: &str = "id, email, password, fullname, is_admin, created_at";

/// Statements removing a user and everything hanging off their posts,
/// children first. Each binds the user ID once.
const DELETE_USER_CASCADE: [&str; 4] = [
    "DELETE FROM comments WHERE post_id IN (SELECT id FROM posts WHERE author_id = ?)",
    "DELETE FROM post_tags WHERE post_id IN (SELECT id FROM posts WHERE author_id = ?)",
    "DELETE FROM posts WHERE author_id = ?",
    "DELETE FROM users WHERE id = ?",
];

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, password, fullname, is_admin, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.password)
    .bind(&user.fullname)
    .bind(user.is_admin)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        ..user.clone()
    })
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn get_user_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn find_by_credentials_sqlite(
    pool: &SqlitePool,
    email: &str,
    password: &str,
) -> Result<Option<User>> {
    let sql = format!(
        "SELECT {} FROM users WHERE email = ? AND password = ?",
        USER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(email)
        .bind(password)
        .fetch_optional(pool)
        .await
        .context("Failed to look up user credentials")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn update_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    sqlx::query("UPDATE users SET password = ?, fullname = ?, is_admin = ? WHERE id = ?")
        .bind(&user.password)
        .bind(&user.fullname)
        .bind(user.is_admin)
        .bind(user.id)
        .execute(pool)
        .await
        .context("Failed to update user")?;

    get_user_by_id_sqlite(pool, user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn delete_user_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    for statement in DELETE_USER_CASCADE {
        sqlx::query(statement)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete user")?;
    }

    tx.commit().await.context("Failed to commit user deletion")?;
    Ok(())
}

async fn count_users_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;

    Ok(row.get("count"))
}

async fn list_users_sqlite(pool: &SqlitePool) -> Result<Vec<User>> {
    let sql = format!("SELECT {} FROM users ORDER BY email", USER_COLUMNS);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    rows.iter().map(row_to_user_sqlite).collect()
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password: row.try_get("password")?,
        fullname: row.try_get("fullname")?,
        is_admin: row.try_get("is_admin")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, password, fullname, is_admin, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.password)
    .bind(&user.fullname)
    .bind(user.is_admin)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        created_at: now,
        ..user.clone()
    })
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn get_user_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn find_by_credentials_mysql(
    pool: &MySqlPool,
    email: &str,
    password: &str,
) -> Result<Option<User>> {
    // BINARY keeps the password comparison case-sensitive under MySQL collations
    let sql = format!(
        "SELECT {} FROM users WHERE email = ? AND BINARY password = ?",
        USER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(email)
        .bind(password)
        .fetch_optional(pool)
        .await
        .context("Failed to look up user credentials")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn update_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    sqlx::query("UPDATE users SET password = ?, fullname = ?, is_admin = ? WHERE id = ?")
        .bind(&user.password)
        .bind(&user.fullname)
        .bind(user.is_admin)
        .bind(user.id)
        .execute(pool)
        .await
        .context("Failed to update user")?;

    get_user_by_id_mysql(pool, user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn delete_user_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    for statement in DELETE_USER_CASCADE {
        sqlx::query(statement)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete user")?;
    }

    tx.commit().await.context("Failed to commit user deletion")?;
    Ok(())
}

async fn count_users_mysql(pool: &MySqlPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;

    Ok(row.get("count"))
}

async fn list_users_mysql(pool: &MySqlPool) -> Result<Vec<User>> {
    let sql = format!("SELECT {} FROM users ORDER BY email", USER_COLUMNS);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    rows.iter().map(row_to_user_mysql).collect()
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password: row.try_get("password")?,
        fullname: row.try_get("fullname")?,
        is_admin: row.try_get("is_admin")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxUserRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxUserRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_user() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo
            .create(&User::new("bob@email.com", "password", "Bob Silva"))
            .await
            .expect("Failed to create user");

        assert!(created.id > 0);
        assert_eq!(created.email, "bob@email.com");
        assert_eq!(created.fullname, "Bob Silva");
        assert!(!created.is_admin);
    }

    #[tokio::test]
    async fn test_get_user_by_email() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&User::new("bob@email.com", "password", "Bob Silva"))
            .await
            .expect("Failed to create user");

        let bob = repo
            .get_by_email("bob@email.com")
            .await
            .expect("Failed to get user")
            .expect("User not found");

        assert_eq!(bob.fullname, "Bob Silva");
    }

    #[tokio::test]
    async fn test_get_user_by_email_not_found() {
        let (_pool, repo) = setup_test_repo().await;

        let found = repo
            .get_by_email("nobody@email.com")
            .await
            .expect("Failed to get user");

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_get_user_by_id() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo
            .create(&User::new("bob@gmail.com", "secret", "Bob"))
            .await
            .expect("Failed to create user");

        let found = repo
            .get_by_id(created.id)
            .await
            .expect("Failed to get user")
            .expect("User not found");

        assert_eq!(found, created);
        assert!(repo.get_by_id(99999).await.expect("Failed to get user").is_none());
    }

    #[tokio::test]
    async fn test_find_by_credentials() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&User::new("bob@gmail.com", "secret", "Bob"))
            .await
            .expect("Failed to create user");

        let found = repo
            .find_by_credentials("bob@gmail.com", "secret")
            .await
            .expect("Failed to look up credentials");
        assert_eq!(found.map(|u| u.fullname), Some("Bob".to_string()));

        assert!(repo
            .find_by_credentials("bob@gmail.com", "badpassword")
            .await
            .expect("Failed to look up credentials")
            .is_none());
        assert!(repo
            .find_by_credentials("tom@gmail.com", "secret")
            .await
            .expect("Failed to look up credentials")
            .is_none());
        assert!(repo
            .find_by_credentials("bob@gmail.com", "SECRET")
            .await
            .expect("Failed to look up credentials")
            .is_none());
    }

    #[tokio::test]
    async fn test_update_user() {
        let (_pool, repo) = setup_test_repo().await;
        let mut user = repo
            .create(&User::new("bob@gmail.com", "secret", "Bob"))
            .await
            .expect("Failed to create user");

        user.fullname = "Bob Silva".to_string();
        user.is_admin = true;
        let updated = repo.update(&user).await.expect("Failed to update user");

        assert_eq!(updated.fullname, "Bob Silva");
        assert!(updated.is_admin);
        assert_eq!(updated.email, "bob@gmail.com");
    }

    #[tokio::test]
    async fn test_count_users() {
        let (_pool, repo) = setup_test_repo().await;
        assert_eq!(repo.count().await.expect("Failed to count"), 0);

        repo.create(&User::new("bob@gmail.com", "secret", "Bob")).await.unwrap();
        repo.create(&User::new("jeff@gmail.com", "secret", "Jeff")).await.unwrap();

        assert_eq!(repo.count().await.expect("Failed to count"), 2);
    }

    #[tokio::test]
    async fn test_list_users_ordered_by_email() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&User::new("jeff@gmail.com", "secret", "Jeff")).await.unwrap();
        repo.create(&User::new("bob@gmail.com", "secret", "Bob")).await.unwrap();

        let users = repo.list().await.expect("Failed to list users");
        let emails: Vec<&str> = users.iter().map(|u| u.email.as_str()).collect();

        assert_eq!(emails, vec!["bob@gmail.com", "jeff@gmail.com"]);
    }

    #[tokio::test]
    async fn test_unique_email_constraint() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&User::new("bob@gmail.com", "secret", "Bob")).await.unwrap();

        let result = repo.create(&User::new("bob@gmail.com", "other", "Other Bob")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_user_removes_posts_and_comments() {
        let (pool, repo) = setup_test_repo().await;
        let bob = repo.create(&User::new("bob@gmail.com", "secret", "Bob")).await.unwrap();
        let jeff = repo.create(&User::new("jeff@gmail.com", "secret", "Jeff")).await.unwrap();

        let sqlite_pool = pool.as_sqlite().unwrap();
        for (author_id, title) in [(bob.id, "Bob post"), (jeff.id, "Jeff post")] {
            sqlx::query(
                "INSERT INTO posts (author_id, title, content, posted_at) \
                 VALUES (?, ?, 'Hello', ?)",
            )
                .bind(author_id)
                .bind(title)
                .bind(Utc::now())
                .execute(sqlite_pool)
                .await
                .unwrap();
        }
        sqlx::query(
            "INSERT INTO comments (post_id, author, content, posted_at) \
             SELECT id, 'Tom', 'Hi', ? FROM posts",
        )
            .bind(Utc::now())
            .execute(sqlite_pool)
            .await
            .unwrap();

        repo.delete(bob.id).await.expect("Failed to delete user");

        let posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(sqlite_pool)
            .await
            .unwrap();
        let comments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
            .fetch_one(sqlite_pool)
            .await
            .unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(posts, 1);
        assert_eq!(comments, 1);
        assert!(repo.get_by_id(bob.id).await.unwrap().is_none());
    }
}
