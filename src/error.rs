/// Unified error types for the catalog
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for catalog operations
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No identity, or an identity that could not be verified
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    /// Role or ownership check failed. Deliberately carries no detail.
    #[error("Insufficient privilege")]
    Permission,

    /// Bad input shape or range
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unique constraint violation (username, review, genre, cover hash)
    #[error("Already exists: {0}")]
    Duplicate(String),

    /// Operation not valid in the current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Referenced id absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Upload of a file type outside the accepted set
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    /// Cover file write/read/delete failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    /// Translate a unique-constraint violation into `Duplicate`, passing other errors through
    pub fn on_unique_violation(err: sqlx::Error, what: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                CatalogError::Duplicate(what.into())
            }
            _ => CatalogError::Database(err),
        }
    }
}

impl From<validator::ValidationErrors> for CatalogError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CatalogError::Validation(errors.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for CatalogError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        CatalogError::Internal(format!("Migration failed: {}", err))
    }
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            CatalogError::AuthenticationRequired(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            CatalogError::Permission => (
                StatusCode::FORBIDDEN,
                "InsufficientPrivilege",
                self.to_string(),
            ),
            CatalogError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            CatalogError::Duplicate(_) => (StatusCode::CONFLICT, "Duplicate", self.to_string()),
            CatalogError::Conflict(_) => (StatusCode::CONFLICT, "Conflict", self.to_string()),
            CatalogError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            CatalogError::UnsupportedType(_) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UnsupportedType",
                self.to_string(),
            ),
            CatalogError::Database(_)
            | CatalogError::Io(_)
            | CatalogError::Storage(_)
            | CatalogError::Internal(_) => {
                tracing::error!("Request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalServerError",
                    "Internal server error".to_string(), // Don't leak details
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
