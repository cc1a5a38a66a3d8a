/// Collection endpoints; every route acts on the caller's own collections
use crate::{
    auth::AuthContext,
    collections::{AddOutcome, Collection, CollectionDetail, CollectionSummary, RemoveOutcome},
    context::AppContext,
    error::CatalogResult,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct NewCollectionRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddBookRequest {
    pub book_id: i64,
}

#[derive(Debug, Serialize)]
pub struct OutcomeResponse<T> {
    pub outcome: T,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/collections", get(list_collections).post(create_collection))
        .route(
            "/api/collections/:id",
            get(get_collection).delete(delete_collection),
        )
        .route("/api/collections/:id/books", post(add_book))
        .route("/api/collections/:id/books/:book_id", delete(remove_book))
}

async fn list_collections(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> CatalogResult<Json<Vec<CollectionSummary>>> {
    Ok(Json(ctx.collections.list_for_user(&auth.identity).await?))
}

async fn create_collection(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<NewCollectionRequest>,
) -> CatalogResult<(StatusCode, Json<Collection>)> {
    let collection = ctx.collections.create(&auth.identity, &req.name).await?;
    Ok((StatusCode::CREATED, Json(collection)))
}

async fn get_collection(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
    auth: AuthContext,
) -> CatalogResult<Json<CollectionDetail>> {
    Ok(Json(ctx.collections.get(&auth.identity, id).await?))
}

async fn delete_collection(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
    auth: AuthContext,
) -> CatalogResult<StatusCode> {
    ctx.collections.delete(&auth.identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_book(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
    auth: AuthContext,
    Json(req): Json<AddBookRequest>,
) -> CatalogResult<Json<OutcomeResponse<AddOutcome>>> {
    let outcome = ctx.collections.add_book(&auth.identity, id, req.book_id).await?;
    Ok(Json(OutcomeResponse { outcome }))
}

async fn remove_book(
    State(ctx): State<AppContext>,
    Path((id, book_id)): Path<(i64, i64)>,
    auth: AuthContext,
) -> CatalogResult<Json<OutcomeResponse<RemoveOutcome>>> {
    let outcome = ctx
        .collections
        .remove_book(&auth.identity, id, book_id)
        .await?;
    Ok(Json(OutcomeResponse { outcome }))
}
