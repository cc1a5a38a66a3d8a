/// Review submission and moderation endpoints
use crate::{
    auth::AuthContext,
    context::AppContext,
    db::Page,
    error::CatalogResult,
    reviews::{ModerationAction, ModerationReport, NewReview, ReviewView},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ModerationRequest {
    pub action: ModerationAction,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/books/:id/reviews", post(submit_review))
        .route("/api/reviews", get(list_all_reviews))
        .route("/api/reviews/mine", get(my_reviews))
        .route("/api/moderation/queue", get(moderation_queue))
        .route("/api/moderation/:review_id", post(moderate_review))
}

async fn submit_review(
    State(ctx): State<AppContext>,
    Path(book_id): Path<i64>,
    auth: AuthContext,
    Json(req): Json<NewReview>,
) -> CatalogResult<(StatusCode, Json<ReviewView>)> {
    let review = ctx.reviews.submit_review(&auth.identity, book_id, req).await?;
    Ok((StatusCode::CREATED, Json(review.view())))
}

async fn my_reviews(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> CatalogResult<Json<Vec<ReviewView>>> {
    let reviews = ctx.reviews.list_by_user(auth.identity.user_id).await?;
    Ok(Json(reviews.into_iter().map(|r| r.view()).collect()))
}

async fn list_all_reviews(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> CatalogResult<Json<Vec<ReviewView>>> {
    let reviews = ctx.reviews.list_all(&auth.identity).await?;
    Ok(Json(reviews.into_iter().map(|r| r.view()).collect()))
}

async fn moderation_queue(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> CatalogResult<Json<Page<ReviewView>>> {
    let page = ctx
        .reviews
        .list_pending(&auth.identity, query.page.unwrap_or(1))
        .await?;
    Ok(Json(page.map(|r| r.view())))
}

async fn moderate_review(
    State(ctx): State<AppContext>,
    Path(review_id): Path<i64>,
    auth: AuthContext,
    Json(req): Json<ModerationRequest>,
) -> CatalogResult<Json<ModerationReport>> {
    let report = ctx
        .reviews
        .moderate(&auth.identity, review_id, req.action)
        .await?;
    Ok(Json(report))
}
