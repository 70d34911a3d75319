//! Data models
//!
//! This module contains the entities of the yabe blog engine:
//! - Database entities (User, Post, Comment, Tag)
//! - Input types for repository writes
//! - Derived views (PostDetail, TagCloudEntry)

mod comment;
mod post;
mod tag;
mod user;

pub use comment::{Comment, CreateCommentInput};
pub use post::{CreatePostInput, Post, PostDetail, UpdatePostInput};
pub use tag::{format_cloud, Tag, TagCloudEntry};
pub use user::{CreateUserInput, User};
