//! User model
//!
//! This module defines the User entity for the yabe blog engine.
//!
//! A user is identified by email. The password is a plain credential compared
//! verbatim by `UserRepository::find_by_credentials`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User entity representing a registered author.
///
/// Users own posts. Comments are not linked to users; a comment carries a
/// free-text author name instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Email address (unique)
    pub email: String,
    /// Login credential
    #[serde(skip_serializing)]
    pub password: String,
    /// Display name
    pub fullname: String,
    /// Whether the user may administer the blog
    pub is_admin: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new, unsaved User.
    ///
    /// The ID will be set to 0 and should be assigned by the database.
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        fullname: impl Into<String>,
    ) -> Self {
        Self {
            id: 0, // Will be set by the database
            email: email.into(),
            password: password.into(),
            fullname: fullname.into(),
            is_admin: false,
            created_at: Utc::now(),
        }
    }

    /// Mark the user as an administrator
    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    /// Check whether the user has been persisted
    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }
}

/// Input for registering a new user
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    /// Email address
    pub email: String,
    /// Login credential
    pub password: String,
    /// Display name
    pub fullname: String,
}

impl CreateUserInput {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        fullname: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            fullname: fullname.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_new() {
        let user = User::new("bob@gmail.com", "secret", "Bob");

        assert_eq!(user.id, 0);
        assert_eq!(user.email, "bob@gmail.com");
        assert_eq!(user.password, "secret");
        assert_eq!(user.fullname, "Bob");
        assert!(!user.is_admin);
        assert!(!user.is_persisted());
    }

    #[test]
    fn test_user_with_admin() {
        let user = User::new("admin@gmail.com", "secret", "Admin").with_admin(true);
        assert!(user.is_admin);
    }

    #[test]
    fn test_password_not_serialized() {
        let user = User::new("bob@gmail.com", "secret", "Bob");
        let json = serde_json::to_string(&user).unwrap();

        assert!(json.contains("bob@gmail.com"));
        assert!(!json.contains("secret"));
    }
}
