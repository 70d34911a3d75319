//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comment entity.
///
/// `author` is a free-text name, not a reference to a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author: String,
    pub content: String,
    pub posted_at: DateTime<Utc>,
}

/// Input for creating a comment
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub post_id: i64,
    pub author: String,
    pub content: String,
    /// Explicit publication time (defaults to now)
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
}

impl CreateCommentInput {
    pub fn new(post_id: i64, author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            post_id,
            author: author.into(),
            content: content.into(),
            posted_at: None,
        }
    }
}
