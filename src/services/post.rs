//! Post service
//!
//! Implements business logic for posts:
//! - Creation with author check
//! - Comments (`add_comment`) and tags (`tag_it_with`)
//! - Tag intersection search
//! - Front post and previous/next navigation
//! - Cascading delete

use crate::db::repositories::{
    CommentRepository, PostRepository, SqlxCommentRepository, SqlxPostRepository,
    SqlxTagRepository, SqlxUserRepository, TagRepository, UserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{
    Comment, CreateCommentInput, CreatePostInput, Post, PostDetail, Tag, UpdatePostInput,
};
use crate::services::tag::{TagService, TagServiceError};
use anyhow::Context;
use std::sync::Arc;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// Post (or its author) not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<TagServiceError> for PostServiceError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::ValidationError(msg) => PostServiceError::ValidationError(msg),
            TagServiceError::InternalError(e) => PostServiceError::InternalError(e),
        }
    }
}

/// Post service
pub struct PostService {
    repo: Arc<dyn PostRepository>,
    comment_repo: Arc<dyn CommentRepository>,
    user_repo: Arc<dyn UserRepository>,
    tag_repo: Arc<dyn TagRepository>,
    tag_service: TagService,
}

impl PostService {
    /// Create a new post service
    pub fn new(
        repo: Arc<dyn PostRepository>,
        comment_repo: Arc<dyn CommentRepository>,
        user_repo: Arc<dyn UserRepository>,
        tag_repo: Arc<dyn TagRepository>,
    ) -> Self {
        Self {
            repo,
            comment_repo,
            user_repo,
            tag_service: TagService::new(tag_repo.clone()),
            tag_repo,
        }
    }

    /// Create a post service backed by the SQLx repositories on `pool`
    pub fn from_pool(pool: DynDatabasePool) -> Self {
        Self::new(
            SqlxPostRepository::boxed(pool.clone()),
            SqlxCommentRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
            SqlxTagRepository::boxed(pool),
        )
    }

    /// Create a new post
    ///
    /// # Errors
    /// - `ValidationError` if the title is empty
    /// - `NotFound` if the author does not exist
    pub async fn create(&self, input: CreatePostInput) -> Result<Post, PostServiceError> {
        if input.title.trim().is_empty() {
            return Err(PostServiceError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }

        if self
            .user_repo
            .get_by_id(input.author_id)
            .await
            .context("Failed to check author")?
            .is_none()
        {
            return Err(PostServiceError::NotFound(format!(
                "author {}",
                input.author_id
            )));
        }

        let post = self
            .repo
            .create(&input)
            .await
            .context("Failed to create post")?;

        tracing::info!("Created post {} \"{}\"", post.id, post.title);
        Ok(post)
    }

    /// Get post by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Post>, PostServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get post by ID")
            .map_err(Into::into)
    }

    /// Update a post's title and/or content
    pub async fn update(&self, id: i64, input: UpdatePostInput) -> Result<Post, PostServiceError> {
        if let Some(title) = &input.title {
            if title.trim().is_empty() {
                return Err(PostServiceError::ValidationError(
                    "Title cannot be empty".to_string(),
                ));
            }
        }
        self.require(id).await?;

        self.repo
            .update(id, &input)
            .await
            .context("Failed to update post")
            .map_err(Into::into)
    }

    /// Delete a post together with its comments and tag associations
    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        self.require(id).await?;

        self.repo
            .delete(id)
            .await
            .context("Failed to delete post")?;

        tracing::info!("Deleted post {}", id);
        Ok(())
    }

    /// Count all posts
    pub async fn count(&self) -> Result<i64, PostServiceError> {
        self.repo
            .count()
            .await
            .context("Failed to count posts")
            .map_err(Into::into)
    }

    /// The `limit` most recent posts
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Post>, PostServiceError> {
        self.repo
            .list_recent(limit)
            .await
            .context("Failed to list recent posts")
            .map_err(Into::into)
    }

    /// Posts by the user with this email, most recent first
    pub async fn find_by_author_email(&self, email: &str) -> Result<Vec<Post>, PostServiceError> {
        self.repo
            .find_by_author_email(email)
            .await
            .context("Failed to find posts by author")
            .map_err(Into::into)
    }

    /// Add a comment to a post. The comment is saved immediately.
    ///
    /// # Errors
    /// - `NotFound` if the post does not exist
    /// - `ValidationError` if the author or content is empty
    pub async fn add_comment(
        &self,
        post_id: i64,
        author: &str,
        content: &str,
    ) -> Result<Comment, PostServiceError> {
        if author.trim().is_empty() {
            return Err(PostServiceError::ValidationError(
                "Comment author cannot be empty".to_string(),
            ));
        }
        if content.trim().is_empty() {
            return Err(PostServiceError::ValidationError(
                "Comment content cannot be empty".to_string(),
            ));
        }
        self.require(post_id).await?;

        let comment = self
            .comment_repo
            .create(&CreateCommentInput::new(post_id, author, content))
            .await
            .context("Failed to add comment")?;

        tracing::debug!("Added comment {} to post {}", comment.id, post_id);
        Ok(comment)
    }

    /// Comments on a post, in the order they were added
    pub async fn comments(&self, post_id: i64) -> Result<Vec<Comment>, PostServiceError> {
        self.comment_repo
            .find_by_post(post_id)
            .await
            .context("Failed to get comments")
            .map_err(Into::into)
    }

    /// Tag a post, creating the tag if needed.
    ///
    /// Tagging twice with the same name is a no-op. Returns the post so calls
    /// can be chained.
    pub async fn tag_it_with(&self, post: &Post, name: &str) -> Result<Post, PostServiceError> {
        let post = self.require(post.id).await?;
        let tag = self.tag_service.find_or_create_by_name(name).await?;

        self.tag_repo
            .add_to_post(tag.id, post.id)
            .await
            .context("Failed to tag post")?;

        tracing::debug!("Tagged post {} with {}", post.id, tag.name);
        Ok(post)
    }

    /// Tags on a post, ordered by name
    pub async fn tags(&self, post_id: i64) -> Result<Vec<Tag>, PostServiceError> {
        self.tag_service.get_by_post_id(post_id).await.map_err(Into::into)
    }

    /// Posts carrying every one of the given tags.
    ///
    /// Repeated names count once; an empty list or an unknown tag yields no
    /// posts.
    pub async fn find_tagged_with<S: AsRef<str>>(
        &self,
        tags: &[S],
    ) -> Result<Vec<Post>, PostServiceError> {
        let names: Vec<String> = tags.iter().map(|t| t.as_ref().trim().to_string()).collect();

        self.repo
            .find_tagged_with(&names)
            .await
            .context("Failed to find tagged posts")
            .map_err(Into::into)
    }

    /// The most recent post
    pub async fn front_post(&self) -> Result<Option<Post>, PostServiceError> {
        self.repo
            .find_latest()
            .await
            .context("Failed to get front post")
            .map_err(Into::into)
    }

    /// The post published just before this one
    pub async fn previous(&self, post: &Post) -> Result<Option<Post>, PostServiceError> {
        self.repo
            .find_previous(post.posted_at)
            .await
            .context("Failed to get previous post")
            .map_err(Into::into)
    }

    /// The post published just after this one
    pub async fn next(&self, post: &Post) -> Result<Option<Post>, PostServiceError> {
        self.repo
            .find_next(post.posted_at)
            .await
            .context("Failed to get next post")
            .map_err(Into::into)
    }

    /// A post with its author, comments and tags
    pub async fn get_detail(&self, id: i64) -> Result<PostDetail, PostServiceError> {
        let post = self.require(id).await?;

        let author = self
            .user_repo
            .get_by_id(post.author_id)
            .await
            .context("Failed to get post author")?
            .ok_or_else(|| PostServiceError::NotFound(format!("author {}", post.author_id)))?;
        let comments = self.comments(id).await?;
        let tags = self.tags(id).await?;

        Ok(PostDetail {
            post,
            author,
            comments,
            tags,
        })
    }

    async fn require(&self, id: i64) -> Result<Post, PostServiceError> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| PostServiceError::NotFound(format!("post {}", id)))
    }
}
