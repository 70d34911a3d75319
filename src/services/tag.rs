//! Tag service
//!
//! Implements business logic for tags:
//! - Find-or-create by name
//! - Tag cloud aggregation

use crate::db::repositories::TagRepository;
use crate::models::{Tag, TagCloudEntry};
use anyhow::Context;
use std::sync::Arc;

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Tag service for managing blog tags
pub struct TagService {
    repo: Arc<dyn TagRepository>,
}

impl TagService {
    /// Create a new tag service
    pub fn new(repo: Arc<dyn TagRepository>) -> Self {
        Self { repo }
    }

    /// Get the tag with this name, creating it if needed.
    ///
    /// Surrounding whitespace is ignored, so `" Red "` and `"Red"` are the
    /// same tag.
    ///
    /// # Errors
    /// - `ValidationError` if the name is empty
    pub async fn find_or_create_by_name(&self, name: &str) -> Result<Tag, TagServiceError> {
        let trimmed_name = name.trim();
        if trimmed_name.is_empty() {
            return Err(TagServiceError::ValidationError(
                "Tag name cannot be empty".to_string(),
            ));
        }

        if let Some(existing) = self
            .repo
            .get_by_name(trimmed_name)
            .await
            .context("Failed to check existing tag")?
        {
            return Ok(existing);
        }

        let created = self
            .repo
            .create(&Tag::new(trimmed_name))
            .await
            .context("Failed to create tag")?;

        tracing::debug!("Created tag {} ({})", created.name, created.id);
        Ok(created)
    }

    /// Get tag by name
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Tag>, TagServiceError> {
        self.repo
            .get_by_name(name.trim())
            .await
            .context("Failed to get tag by name")
            .map_err(Into::into)
    }

    /// List all tags ordered by name
    pub async fn list(&self) -> Result<Vec<Tag>, TagServiceError> {
        self.repo
            .list()
            .await
            .context("Failed to list tags")
            .map_err(Into::into)
    }

    /// Tags on a post, ordered by name
    pub async fn get_by_post_id(&self, post_id: i64) -> Result<Vec<Tag>, TagServiceError> {
        self.repo
            .get_by_post_id(post_id)
            .await
            .context("Failed to get tags for post")
            .map_err(Into::into)
    }

    /// The tag cloud: every tag in use with the number of posts carrying it,
    /// in ascending name order
    pub async fn get_cloud(&self) -> Result<Vec<TagCloudEntry>, TagServiceError> {
        self.repo
            .cloud()
            .await
            .context("Failed to get tag cloud")
            .map_err(Into::into)
    }
}
