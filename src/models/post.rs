//! Post model
//!
//! This module provides:
//! - `Post` entity representing a blog post
//! - Input types for creating and updating posts
//! - `PostDetail`, a post together with its author, comments and tags

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Comment, Tag, User};

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    /// Unique identifier
    pub id: i64,
    /// Author user ID
    pub author_id: i64,
    /// Post title
    pub title: String,
    /// Post body
    pub content: String,
    /// Publication timestamp, fixed at creation
    pub posted_at: DateTime<Utc>,
}

impl Post {
    /// Create a new, unsaved post stamped with the current time
    pub fn new(author: &User, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: 0, // Will be set by database
            author_id: author.id,
            title: title.into(),
            content: content.into(),
            posted_at: Utc::now(),
        }
    }
}

/// Input for creating a post
#[derive(Debug, Clone)]
pub struct CreatePostInput {
    pub author_id: i64,
    pub title: String,
    pub content: String,
    /// Explicit publication time (defaults to now)
    pub posted_at: Option<DateTime<Utc>>,
}

impl From<&Post> for CreatePostInput {
    fn from(post: &Post) -> Self {
        Self {
            author_id: post.author_id,
            title: post.title.clone(),
            content: post.content.clone(),
            posted_at: Some(post.posted_at),
        }
    }
}

/// Input for updating a post.
///
/// `posted_at` is deliberately absent: it never changes after creation.
#[derive(Debug, Clone, Default)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// A post with its relations loaded
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub author: User,
    /// Comments in insertion order
    pub comments: Vec<Comment>,
    /// Tags sorted by name
    pub tags: Vec<Tag>,
}
