/// Registration and login endpoints
use crate::{
    account::{issue_access_token, NewUser, User},
    auth::AuthContext,
    context::AppContext,
    error::CatalogResult,
};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Session response
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub user: User,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
}

fn session_for(ctx: &AppContext, user: User) -> CatalogResult<SessionResponse> {
    let auth = &ctx.config.authentication;
    let access_token = issue_access_token(&user, &auth.jwt_secret, auth.session_ttl_secs)?;

    Ok(SessionResponse {
        access_token,
        expires_in: auth.session_ttl_secs,
        user,
    })
}

async fn register(
    State(ctx): State<AppContext>,
    Json(req): Json<NewUser>,
) -> CatalogResult<(StatusCode, Json<SessionResponse>)> {
    let user = ctx.users.register(req).await?;
    Ok((StatusCode::CREATED, Json(session_for(&ctx, user)?)))
}

async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> CatalogResult<Json<SessionResponse>> {
    let user = ctx.users.authenticate(&req.username, &req.password).await?;
    tracing::info!(user_id = user.id, "User logged in");
    Ok(Json(session_for(&ctx, user)?))
}

async fn me(State(ctx): State<AppContext>, auth: AuthContext) -> CatalogResult<Json<User>> {
    Ok(Json(ctx.users.get_user(auth.identity.user_id).await?))
}
