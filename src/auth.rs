/// Authentication extractors and utilities
///
/// The bearer token only proves who the caller is. Their role is read from
/// the database on every request so a demotion takes effect immediately.
use crate::{
    access::{require_identity, Identity},
    account::verify_access_token,
    context::AppContext,
    error::{CatalogError, CatalogResult},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Resolve a token to the caller's current identity
async fn resolve_identity(state: &AppContext, token: &str) -> CatalogResult<Identity> {
    let claims = verify_access_token(token, &state.config.authentication.jwt_secret)?;

    match state.users.get_user(claims.user_id()?).await {
        Ok(user) => Ok(user.identity()),
        Err(CatalogError::NotFound(_)) => Err(CatalogError::AuthenticationRequired(
            "Account no longer exists".to_string(),
        )),
        Err(e) => Err(e),
    }
}

/// Authenticated context - fails with 401 without a valid token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: Identity,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = CatalogError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let identity = match extract_bearer_token(&parts.headers) {
            Some(token) => Some(resolve_identity(state, &token).await?),
            None => None,
        };

        let identity = require_identity(identity.as_ref())?.clone();

        Ok(AuthContext { identity })
    }
}

/// Optional authenticated context - does not fail if no auth provided
#[derive(Debug, Clone)]
pub struct OptionalAuthContext {
    pub identity: Option<Identity>,
}

#[async_trait]
impl FromRequestParts<AppContext> for OptionalAuthContext {
    type Rejection = CatalogError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let identity = match extract_bearer_token(&parts.headers) {
            Some(token) => match resolve_identity(state, &token).await {
                Ok(identity) => Some(identity),
                Err(CatalogError::AuthenticationRequired(reason)) => {
                    tracing::debug!("Ignoring invalid token on public route: {}", reason);
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        Ok(OptionalAuthContext { identity })
    }
}
