/// Roles, capabilities and the guard functions every operation starts with
use crate::error::{CatalogError, CatalogResult};
use serde::{Deserialize, Serialize};

/// Role tiers, seeded as reference data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Browses, reviews and keeps collections
    User,
    /// Edits books and moderates reviews
    Moderator,
    /// Full access
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> CatalogResult<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            _ => Err(CatalogError::Validation(format!("Invalid role: {}", s))),
        }
    }

    /// Whether this role is granted a capability
    pub fn grants(&self, capability: Capability) -> bool {
        use Capability::*;

        match self {
            Role::Admin => true,
            Role::Moderator => matches!(
                capability,
                EditBook | ModerateReviews | SubmitReview | ManageCollections
            ),
            Role::User => matches!(capability, SubmitReview | ManageCollections),
        }
    }
}

/// Coarse actions gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    AddBook,
    EditBook,
    DeleteBook,
    ManageGenres,
    ManageUsers,
    ModerateReviews,
    ViewAllReviews,
    SubmitReview,
    ManageCollections,
}

/// The caller of an operation, resolved by the HTTP layer and passed explicitly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn can(&self, capability: Capability) -> bool {
        self.role.grants(capability)
    }
}

/// Fail with `AuthenticationRequired` when no identity is present
pub fn require_identity(identity: Option<&Identity>) -> CatalogResult<&Identity> {
    identity.ok_or_else(|| {
        CatalogError::AuthenticationRequired("Sign in to perform this action".to_string())
    })
}

/// Fail with a generic `Permission` error unless the role grants the capability
pub fn require_capability(identity: &Identity, capability: Capability) -> CatalogResult<()> {
    if identity.can(capability) {
        Ok(())
    } else {
        tracing::warn!(
            user_id = identity.user_id,
            role = identity.role.as_str(),
            ?capability,
            "Capability check failed"
        );
        Err(CatalogError::Permission)
    }
}

/// Fail with a generic `Permission` error unless the identity owns the resource
pub fn require_owner(identity: &Identity, owner_id: i64) -> CatalogResult<()> {
    if identity.user_id == owner_id {
        Ok(())
    } else {
        tracing::warn!(
            user_id = identity.user_id,
            owner_id,
            "Ownership check failed"
        );
        Err(CatalogError::Permission)
    }
}
