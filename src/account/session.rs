/// Stateless HS256 access tokens
use crate::{
    account::User,
    error::{CatalogError, CatalogResult},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Access token claims. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn user_id(&self) -> CatalogResult<i64> {
        self.sub.parse().map_err(|_| {
            CatalogError::AuthenticationRequired("Invalid token subject".to_string())
        })
    }
}

/// Generate an access token for a user
pub fn issue_access_token(user: &User, jwt_secret: &str, ttl_secs: i64) -> CatalogResult<String> {
    let now = Utc::now().timestamp();
    let claims = SessionClaims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        iat: now,
        exp: now + ttl_secs,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| CatalogError::Internal(format!("Failed to generate token: {}", e)))
}

/// Verify signature and expiry of an access token
pub fn verify_access_token(token: &str, jwt_secret: &str) -> CatalogResult<SessionClaims> {
    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 30;

    decode::<SessionClaims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!("Token verification failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    CatalogError::AuthenticationRequired("Token has expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    CatalogError::AuthenticationRequired("Invalid token signature".to_string())
                }
                _ => CatalogError::AuthenticationRequired("Invalid token".to_string()),
            }
        })
}
