//! User service
//!
//! Implements business logic for users:
//! - Registration with email uniqueness check
//! - `connect`, the credential lookup
//! - Account removal (cascades to the user's posts)

use crate::db::repositories::UserRepository;
use crate::models::{CreateUserInput, User};
use anyhow::Context;
use std::sync::Arc;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// User not found
    #[error("User not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Email already registered
    #[error("User already exists: {0}")]
    UserExists(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
}

impl UserService {
    /// Create a new user service
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    /// Register a new user
    ///
    /// # Errors
    /// - `ValidationError` if the email, password or fullname is empty, or the
    ///   email has no `@`
    /// - `UserExists` if the email is already registered
    /// - `InternalError` for database errors
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        validate_register_input(&input)?;

        if self
            .user_repo
            .get_by_email(&input.email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                input.email
            )));
        }

        let user = User::new(input.email, input.password, input.fullname);
        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!("Registered user {} ({})", created.id, created.email);
        Ok(created)
    }

    /// Look up the user with exactly this email and password.
    ///
    /// An unknown email or a wrong password yields `None`, not an error.
    pub async fn connect(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .find_by_credentials(email, password)
            .await
            .context("Failed to check credentials")?;

        if user.is_none() {
            tracing::debug!("Rejected credentials for {}", email);
        }
        Ok(user)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")
            .map_err(Into::into)
    }

    /// Get user by email
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        self.user_repo
            .get_by_email(email)
            .await
            .context("Failed to get user by email")
            .map_err(Into::into)
    }

    /// Count registered users
    pub async fn count(&self) -> Result<i64, UserServiceError> {
        self.user_repo
            .count()
            .await
            .context("Failed to count users")
            .map_err(Into::into)
    }

    /// Delete a user along with their posts
    ///
    /// # Errors
    /// - `NotFound` if no user has this ID
    pub async fn delete(&self, id: i64) -> Result<(), UserServiceError> {
        if self.get_by_id(id).await?.is_none() {
            return Err(UserServiceError::NotFound(id.to_string()));
        }

        self.user_repo
            .delete(id)
            .await
            .context("Failed to delete user")?;

        tracing::info!("Deleted user {}", id);
        Ok(())
    }
}

fn validate_register_input(input: &CreateUserInput) -> Result<(), UserServiceError> {
    if input.email.trim().is_empty() {
        return Err(UserServiceError::ValidationError(
            "Email cannot be empty".to_string(),
        ));
    }
    if !input.email.contains('@') {
        return Err(UserServiceError::ValidationError(format!(
            "Invalid email: {}",
            input.email
        )));
    }
    if input.password.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Password cannot be empty".to_string(),
        ));
    }
    if input.fullname.trim().is_empty() {
        return Err(UserServiceError::ValidationError(
            "Fullname cannot be empty".to_string(),
        ));
    }
    Ok(())
}
