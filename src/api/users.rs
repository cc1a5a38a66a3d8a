/// User administration endpoints
use crate::{
    access::{require_capability, Capability, Role},
    account::{NewUser, RoleRecord, User, UserUpdate},
    auth::AuthContext,
    context::AppContext,
    error::CatalogResult,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

/// Admin user creation: registration fields plus a role
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(flatten)]
    pub user: NewUser,
    pub role: Role,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/:id", put(update_user).delete(delete_user))
        .route("/api/roles", get(list_roles))
}

async fn list_users(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> CatalogResult<Json<Vec<User>>> {
    Ok(Json(ctx.users.list_users(&auth.identity).await?))
}

async fn create_user(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> CatalogResult<(StatusCode, Json<User>)> {
    let user = ctx.users.create_user(&auth.identity, req.user, req.role).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
    auth: AuthContext,
    Json(req): Json<UserUpdate>,
) -> CatalogResult<Json<User>> {
    Ok(Json(ctx.users.update_user(&auth.identity, id, req).await?))
}

async fn delete_user(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
    auth: AuthContext,
) -> CatalogResult<StatusCode> {
    ctx.users.delete_user(&auth.identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_roles(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> CatalogResult<Json<Vec<RoleRecord>>> {
    require_capability(&auth.identity, Capability::ManageUsers)?;
    Ok(Json(ctx.users.list_roles().await?))
}
