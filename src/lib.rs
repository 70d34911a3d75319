//! yabe - yet another blog engine
//!
//! The model layer of a small blog: users, posts, comments and tags stored
//! through sqlx on SQLite or MySQL, plus a YAML fixture loader.

pub mod config;
pub mod db;
pub mod fixtures;
pub mod models;
pub mod services;
