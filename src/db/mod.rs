//! Database layer
//!
//! This module provides database abstraction for the yabe blog engine.
//! It supports:
//! - SQLite (default, also used in-memory by the test suite)
//! - MySQL
//!
//! # Usage
//!
//! ```ignore
//! use yabe::config::DatabaseConfig;
//! use yabe::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
