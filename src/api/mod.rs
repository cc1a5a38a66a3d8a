/// API routes and handlers
pub mod auth;
pub mod books;
pub mod collections;
pub mod reviews;
pub mod users;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(auth::routes())
        .merge(books::routes())
        .merge(reviews::routes())
        .merge(users::routes())
        .merge(collections::routes())
}
