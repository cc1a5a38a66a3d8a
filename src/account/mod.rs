/// Account management system
///
/// Handles user registration, administration of users, password
/// verification and stateless session tokens.

mod manager;
pub mod session;

pub use manager::UserManager;
pub use session::{issue_access_token, verify_access_token, SessionClaims};

use crate::access::{Identity, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// User record (the password hash never leaves the manager)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// Registration or admin-created user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 4))]
    pub password: String,
    #[validate(length(min = 1, max = 64))]
    pub last_name: String,
    #[validate(length(min = 1, max = 64))]
    pub first_name: String,
    #[validate(length(max = 64))]
    pub middle_name: Option<String>,
}

/// Admin edit of an existing user; the username is immutable
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(length(min = 1, max = 64))]
    pub last_name: String,
    #[validate(length(min = 1, max = 64))]
    pub first_name: String,
    #[validate(length(max = 64))]
    pub middle_name: Option<String>,
    pub role: Role,
    /// New password, unchanged when absent or empty
    pub password: Option<String>,
}

/// Role reference row, for user administration forms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
}
