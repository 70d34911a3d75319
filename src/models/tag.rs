//! Tag model
//!
//! This module defines the Tag entity and the tag cloud row type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag entity.
///
/// Tags label posts through a many-to-many association. The name is unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    /// Unique identifier
    pub id: i64,
    /// Tag label
    pub name: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Tag {
    /// Create a new Tag with the given name.
    ///
    /// The ID will be set to 0 and should be assigned by the database.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0, // Will be set by the database
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// One row of the tag cloud: a tag name and how many posts carry it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagCloudEntry {
    /// Tag name
    pub tag: String,
    /// Number of posts with this tag
    pub pound: i64,
}

impl TagCloudEntry {
    pub fn new(tag: impl Into<String>, pound: i64) -> Self {
        Self {
            tag: tag.into(),
            pound,
        }
    }
}

impl fmt::Display for TagCloudEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{tag={}, pound={}}}", self.tag, self.pound)
    }
}

/// Render a cloud as `[{tag=A, pound=1}, {tag=B, pound=2}]`
pub fn format_cloud(cloud: &[TagCloudEntry]) -> String {
    let rows: Vec<String> = cloud.iter().map(ToString::to_string).collect();
    format!("[{}]", rows.join(", "))
}
